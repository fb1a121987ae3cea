// Property registry
//
// Maps the persisted key names ("iconsize", "gridsize", ...) to typed
// getter/setter pairs so that front ends can edit a configuration by name.
// Every registration is checked up front: a key can only be registered once
// and the getter must produce the declared kind.

use crate::models::{
    Configuration, DiskImageFormat, GridSize, MAX_ICON_SIZE, MIN_ICON_SIZE, TextPosition,
};
use indexmap::IndexMap;
use std::fmt;
use thiserror::Error;

use super::ProjectError;

/// The type of value a property holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Text,
    Integer,
    Boolean,
    Size,
    Format,
    TextPosition,
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyKind::Text => "text",
            PropertyKind::Integer => "integer",
            PropertyKind::Boolean => "boolean",
            PropertyKind::Size => "size",
            PropertyKind::Format => "format",
            PropertyKind::TextPosition => "text position",
        };
        f.write_str(name)
    }
}

/// A property value of any kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Text(String),
    Integer(u32),
    Boolean(bool),
    Size(GridSize),
    Format(DiskImageFormat),
    TextPosition(TextPosition),
}

impl PropertyValue {
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::Text(_) => PropertyKind::Text,
            PropertyValue::Integer(_) => PropertyKind::Integer,
            PropertyValue::Boolean(_) => PropertyKind::Boolean,
            PropertyValue::Size(_) => PropertyKind::Size,
            PropertyValue::Format(_) => PropertyKind::Format,
            PropertyValue::TextPosition(_) => PropertyKind::TextPosition,
        }
    }

    /// Parse user input into a value of the given kind.
    pub fn parse(kind: PropertyKind, raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        match kind {
            PropertyKind::Text => Ok(PropertyValue::Text(raw.to_string())),
            PropertyKind::Integer => raw
                .parse()
                .map(PropertyValue::Integer)
                .map_err(|_| format!("'{}' is not a non-negative integer", raw)),
            PropertyKind::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(PropertyValue::Boolean(true)),
                "false" | "no" | "off" | "0" => Ok(PropertyValue::Boolean(false)),
                _ => Err(format!("'{}' is not a boolean", raw)),
            },
            PropertyKind::Size => raw.parse().map(PropertyValue::Size),
            PropertyKind::Format => raw.parse().map(PropertyValue::Format),
            PropertyKind::TextPosition => raw.parse().map(PropertyValue::TextPosition),
        }
    }

    fn into_text(self) -> Result<String, String> {
        match self {
            PropertyValue::Text(text) => Ok(text),
            other => Err(mismatch(PropertyKind::Text, &other)),
        }
    }

    fn into_integer(self) -> Result<u32, String> {
        match self {
            PropertyValue::Integer(value) => Ok(value),
            other => Err(mismatch(PropertyKind::Integer, &other)),
        }
    }

    fn into_bool(self) -> Result<bool, String> {
        match self {
            PropertyValue::Boolean(value) => Ok(value),
            other => Err(mismatch(PropertyKind::Boolean, &other)),
        }
    }

    fn into_size(self) -> Result<GridSize, String> {
        match self {
            PropertyValue::Size(size) => Ok(size),
            other => Err(mismatch(PropertyKind::Size, &other)),
        }
    }

    fn into_format(self) -> Result<DiskImageFormat, String> {
        match self {
            PropertyValue::Format(format) => Ok(format),
            other => Err(mismatch(PropertyKind::Format, &other)),
        }
    }

    fn into_text_position(self) -> Result<TextPosition, String> {
        match self {
            PropertyValue::TextPosition(position) => Ok(position),
            other => Err(mismatch(PropertyKind::TextPosition, &other)),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Text(text) => write!(f, "{}", text),
            PropertyValue::Integer(value) => write!(f, "{}", value),
            PropertyValue::Boolean(value) => write!(f, "{}", value),
            PropertyValue::Size(size) => write!(f, "{}", size),
            PropertyValue::Format(format) => write!(f, "{}", format),
            PropertyValue::TextPosition(position) => write!(f, "{}", position),
        }
    }
}

fn mismatch(expected: PropertyKind, got: &PropertyValue) -> String {
    format!("expected a {} value, got a {} value", expected, got.kind())
}

pub type Getter = fn(&Configuration) -> PropertyValue;
pub type Setter = fn(&mut Configuration, PropertyValue) -> Result<(), String>;

/// A registered property.
#[derive(Clone, Copy)]
pub struct Property {
    pub key: &'static str,
    pub kind: PropertyKind,
    getter: Getter,
    setter: Setter,
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Errors raised while registering a property.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Property '{0}' is already registered")]
    Duplicate(&'static str),

    #[error("Property '{key}' is declared as {declared} but its getter returns {actual}")]
    KindMismatch {
        key: &'static str,
        declared: PropertyKind,
        actual: PropertyKind,
    },

    #[error("Property key must be a non-empty lowercase identifier, got '{0}'")]
    InvalidKey(&'static str),
}

/// String key to typed accessor mapping, in registration order.
#[derive(Debug, Clone, Default)]
pub struct PropertyRegistry {
    properties: IndexMap<&'static str, Property>,
}

impl PropertyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry for every persisted configuration key.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry
            .register_standard()
            .expect("Standard property table is invalid");
        registry
    }

    /// Register a property, validating the key and the getter's kind.
    pub fn register(
        &mut self,
        key: &'static str,
        kind: PropertyKind,
        getter: Getter,
        setter: Setter,
    ) -> Result<(), RegistrationError> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(RegistrationError::InvalidKey(key));
        }

        if self.properties.contains_key(key) {
            return Err(RegistrationError::Duplicate(key));
        }

        let actual = getter(&Configuration::default()).kind();
        if actual != kind {
            return Err(RegistrationError::KindMismatch {
                key,
                declared: kind,
                actual,
            });
        }

        self.properties.insert(
            key,
            Property {
                key,
                kind,
                getter,
                setter,
            },
        );
        Ok(())
    }

    fn register_standard(&mut self) -> Result<(), RegistrationError> {
        self.register(
            "background",
            PropertyKind::Text,
            |c| PropertyValue::Text(c.background.clone()),
            |c, v| {
                c.background = v.into_text()?;
                Ok(())
            },
        )?;
        self.register(
            "icon",
            PropertyKind::Text,
            |c| PropertyValue::Text(c.icon.clone()),
            |c, v| {
                c.icon = v.into_text()?;
                Ok(())
            },
        )?;
        self.register(
            "filename",
            PropertyKind::Text,
            |c| PropertyValue::Text(c.filename.clone()),
            |c, v| {
                c.filename = v.into_text()?;
                Ok(())
            },
        )?;
        self.register(
            "volumename",
            PropertyKind::Text,
            |c| PropertyValue::Text(c.volumename.clone()),
            |c, v| {
                c.volumename = v.into_text()?;
                Ok(())
            },
        )?;
        self.register(
            "format",
            PropertyKind::Format,
            |c| PropertyValue::Format(c.format),
            |c, v| {
                c.format = v.into_format()?;
                Ok(())
            },
        )?;
        self.register(
            "iconsize",
            PropertyKind::Integer,
            |c| PropertyValue::Integer(c.iconsize),
            |c, v| {
                let size = v.into_integer()?;
                if !(MIN_ICON_SIZE..=MAX_ICON_SIZE).contains(&size) {
                    return Err(format!(
                        "icon size {} is outside {}..={}",
                        size, MIN_ICON_SIZE, MAX_ICON_SIZE
                    ));
                }
                c.iconsize = size;
                Ok(())
            },
        )?;
        self.register(
            "gridsize",
            PropertyKind::Size,
            |c| PropertyValue::Size(c.gridsize),
            |c, v| {
                c.gridsize = v.into_size()?;
                Ok(())
            },
        )?;
        self.register(
            "snaptogrid",
            PropertyKind::Boolean,
            |c| PropertyValue::Boolean(c.snaptogrid),
            |c, v| {
                c.snaptogrid = v.into_bool()?;
                Ok(())
            },
        )?;
        self.register(
            "snaptofeatures",
            PropertyKind::Boolean,
            |c| PropertyValue::Boolean(c.snaptofeatures),
            |c, v| {
                c.snaptofeatures = v.into_bool()?;
                Ok(())
            },
        )?;
        self.register(
            "gridvisible",
            PropertyKind::Boolean,
            |c| PropertyValue::Boolean(c.gridvisible),
            |c, v| {
                c.gridvisible = v.into_bool()?;
                Ok(())
            },
        )?;
        self.register(
            "iconsvisible",
            PropertyKind::Boolean,
            |c| PropertyValue::Boolean(c.iconsvisible),
            |c, v| {
                c.iconsvisible = v.into_bool()?;
                Ok(())
            },
        )?;
        self.register(
            "featuresize",
            PropertyKind::Integer,
            |c| PropertyValue::Integer(c.featuresize),
            |c, v| {
                c.featuresize = v.into_integer()?;
                Ok(())
            },
        )?;
        self.register(
            "detectfeatures",
            PropertyKind::Boolean,
            |c| PropertyValue::Boolean(c.detectfeatures),
            |c, v| {
                c.detectfeatures = v.into_bool()?;
                Ok(())
            },
        )?;
        self.register(
            "textsize",
            PropertyKind::Integer,
            |c| PropertyValue::Integer(c.textsize),
            |c, v| {
                c.textsize = v.into_integer()?;
                Ok(())
            },
        )?;
        self.register(
            "textposition",
            PropertyKind::TextPosition,
            |c| PropertyValue::TextPosition(c.textposition),
            |c, v| {
                c.textposition = v.into_text_position()?;
                Ok(())
            },
        )?;
        self.register(
            "license",
            PropertyKind::Text,
            |c| PropertyValue::Text(c.license.clone()),
            |c, v| {
                c.license = v.into_text()?;
                Ok(())
            },
        )?;

        Ok(())
    }

    pub fn get(&self, config: &Configuration, key: &str) -> Result<PropertyValue, ProjectError> {
        let property = self.lookup(key)?;
        Ok((property.getter)(config))
    }

    /// Set a property.
    ///
    /// The change is applied to a copy first and only committed if the
    /// resulting configuration still satisfies every invariant, so a rejected
    /// value never leaves `config` half-updated.
    pub fn set(
        &self,
        config: &mut Configuration,
        key: &str,
        value: PropertyValue,
    ) -> Result<(), ProjectError> {
        let property = self.lookup(key)?;

        if value.kind() != property.kind {
            return Err(ProjectError::InvalidValue {
                key: property.key.to_string(),
                reason: mismatch(property.kind, &value),
            });
        }

        let mut candidate = config.clone();
        (property.setter)(&mut candidate, value).map_err(|reason| ProjectError::InvalidValue {
            key: property.key.to_string(),
            reason,
        })?;

        candidate
            .check_invariants()
            .map_err(|(key, reason)| ProjectError::InvalidValue {
                key: key.to_string(),
                reason,
            })?;

        *config = candidate;
        Ok(())
    }

    /// Parse `raw` according to the property's kind and set it.
    pub fn set_from_str(
        &self,
        config: &mut Configuration,
        key: &str,
        raw: &str,
    ) -> Result<(), ProjectError> {
        let property = self.lookup(key)?;
        let value = PropertyValue::parse(property.kind, raw).map_err(|reason| {
            ProjectError::InvalidValue {
                key: property.key.to_string(),
                reason,
            }
        })?;
        self.set(config, key, value)
    }

    pub fn kind(&self, key: &str) -> Option<PropertyKind> {
        self.properties.get(key).map(|property| property.kind)
    }

    /// The registered key matching `key`, with the registry's static lifetime.
    pub fn canonical_key(&self, key: &str) -> Option<&'static str> {
        self.properties.get(key).map(|property| property.key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.properties.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Every property of `config`, in registration order.
    pub fn values(&self, config: &Configuration) -> Vec<(&'static str, PropertyValue)> {
        self.properties
            .values()
            .map(|property| (property.key, (property.getter)(config)))
            .collect()
    }

    fn lookup(&self, key: &str) -> Result<&Property, ProjectError> {
        self.properties
            .get(key)
            .ok_or_else(|| ProjectError::InvalidPropertyKey(key.to_string()))
    }
}
