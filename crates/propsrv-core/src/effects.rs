//! Effect-group view used by the ShakeIt sources.
//!
//! The host hands over an [`EffectTree`] per plugin on every tick. Names of
//! the form `<prefix>.<uuid>.<attribute>` read one attribute of the first
//! container carrying that id.

use std::fmt;

use uuid::Uuid;

use crate::value::{PropertyValue, ValueType};

/// Attributes readable from an effect group or effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectAttribute {
    Gain,
    IsMuted,
}

impl EffectAttribute {
    /// Parses an attribute name, ignoring ASCII case.
    pub fn parse(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("gain") {
            Some(Self::Gain)
        } else if name.eq_ignore_ascii_case("ismuted") {
            Some(Self::IsMuted)
        } else {
            None
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Gain => ValueType::Double,
            Self::IsMuted => ValueType::Boolean,
        }
    }

    /// Reads this attribute from a container.
    pub fn read(&self, container: &EffectContainer) -> PropertyValue {
        match self {
            Self::Gain => PropertyValue::Double(container.gain),
            Self::IsMuted => PropertyValue::Bool(container.is_muted),
        }
    }
}

impl fmt::Display for EffectAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gain => f.write_str("gain"),
            Self::IsMuted => f.write_str("isMuted"),
        }
    }
}

/// An effect group or a single effect.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectContainer {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub gain: f64,
    pub is_muted: bool,
    /// Nested effects (empty for leaf effects)
    pub children: Vec<EffectContainer>,
}

impl EffectContainer {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            gain: 100.0,
            is_muted: false,
            children: Vec::new(),
        }
    }

    pub fn with_gain(mut self, gain: f64) -> Self {
        self.gain = gain;
        self
    }

    pub fn muted(mut self, is_muted: bool) -> Self {
        self.is_muted = is_muted;
        self
    }

    pub fn with_child(mut self, child: EffectContainer) -> Self {
        self.children.push(child);
        self
    }

    fn find(&self, id: Uuid) -> Option<&EffectContainer> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }
}

/// One profile of an effect plugin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectProfile {
    pub name: String,
    pub containers: Vec<EffectContainer>,
}

/// All profiles of one effect plugin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectTree {
    pub profiles: Vec<EffectProfile>,
}

impl EffectTree {
    /// Finds the first container with `id`, depth-first across all profiles.
    ///
    /// Ids are not guaranteed unique by the host; the first match wins.
    pub fn find(&self, id: Uuid) -> Option<&EffectContainer> {
        self.profiles
            .iter()
            .flat_map(|p| p.containers.iter())
            .find_map(|c| c.find(id))
    }
}
