//! Typed property reads on host and VM handles.

use crate::error::{Result, VixError};
use hostvix_api::{ErrorCode, HostApi, HostValue, OwnedHandle, PropertyId, PropertyType, RawHandle};
use std::sync::Arc;

/// A decoded property value.
#[derive(Debug)]
pub enum PropertyValue {
    /// Integer and 64-bit integer properties.
    Integer(i64),
    Boolean(bool),
    String(String),
    /// A handle owned by the caller, released on drop.
    Handle(OwnedHandle),
    /// The property is declared without a concrete type.
    None,
}

impl PropertyValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<RawHandle> {
        match self {
            Self::Handle(h) => Some(h.raw()),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Read property `id` of `owner`.
///
/// The property's declared type is looked up first and selects the decoder;
/// callers never state the type they expect.
pub fn get_property(
    api: &Arc<dyn HostApi>,
    owner: RawHandle,
    id: PropertyId,
) -> Result<PropertyValue> {
    let host_error = |code: ErrorCode| VixError::Property {
        id,
        code: Some(code),
        message: api.error_text(code),
    };

    if !owner.is_valid() {
        return Err(host_error(ErrorCode::INVALID_HANDLE));
    }

    let ty = api.property_type(owner, id).map_err(host_error)?;
    tracing::trace!(%owner, %id, %ty, "Reading property");

    let value = match ty {
        PropertyType::Any => return Ok(PropertyValue::None),
        PropertyType::Blob => {
            return Err(VixError::Property {
                id,
                code: Some(ErrorCode::NOT_SUPPORTED),
                message: "blob properties are not supported".into(),
            })
        }
        _ => api.get_property(owner, id, ty).map_err(host_error)?,
    };

    decode(api, id, ty, value)
}

fn decode(
    api: &Arc<dyn HostApi>,
    id: PropertyId,
    ty: PropertyType,
    value: HostValue,
) -> Result<PropertyValue> {
    let decoded = match (ty, value) {
        (PropertyType::Integer, HostValue::Integer(v)) => PropertyValue::Integer(i64::from(v)),
        (PropertyType::Int64, HostValue::Int64(v)) => PropertyValue::Integer(v),
        (PropertyType::Bool, HostValue::Bool(v)) => PropertyValue::Boolean(v),
        (PropertyType::String, HostValue::Text(bytes)) => {
            let s = String::from_utf8(bytes).map_err(|e| VixError::Property {
                id,
                code: None,
                message: format!("string value is not valid UTF-8: {e}"),
            })?;
            PropertyValue::String(s)
        }
        (PropertyType::Handle, HostValue::Handle(raw)) => {
            PropertyValue::Handle(OwnedHandle::new(api.clone(), raw))
        }
        (ty, other) => {
            let stored = other.property_type();
            if let HostValue::Handle(raw) = other {
                drop(OwnedHandle::new(api.clone(), raw));
            }
            return Err(VixError::Property {
                id,
                code: Some(ErrorCode::TYPE_MISMATCH),
                message: format!("declared {ty} but host returned {stored}"),
            });
        }
    };
    Ok(decoded)
}
