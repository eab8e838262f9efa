//! Name resolution across property sources.
//!
//! The [`PropertyRegistry`] turns a qualified name such as `dcp.gd.Rpms` into
//! a [`PropertyDescriptor`]:
//!
//! 1. The source is chosen by longest matching prefix (`dcp.gd` beats `dcp`).
//! 2. Names without a known prefix fall back to the generic property table.
//!    This always succeeds; the value may simply be absent at update time.
//! 3. Effect-group sources parse `<uuid>.<attribute>`.
//! 4. All other sources look the plain name up in their registered
//!    [`TypeShape`] as a getter, field, or zero-argument method.
//!
//! Resolution is deterministic for a given set of shapes, so successful
//! results are memoized by qualified name.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use tracing::{debug, info};
use uuid::Uuid;

use crate::descriptor::{Accessor, PropertyDescriptor};
use crate::effects::EffectAttribute;
use crate::error::ResolutionError;
use crate::shape::{MemberInfo, MemberKind, TypeShape};
use crate::source::{PropertySource, PREFIX_SEPARATOR};
use crate::value::ValueType;

/// Resolves qualified property names against registered backing types.
///
/// Shared by reference between the subscription manager and every client
/// session; all methods take `&self`.
#[derive(Debug)]
pub struct PropertyRegistry {
    shapes: BTreeMap<PropertySource, TypeShape>,
    cache: RwLock<HashMap<String, PropertyDescriptor>>,
}

impl PropertyRegistry {
    pub fn builder() -> PropertyRegistryBuilder {
        PropertyRegistryBuilder {
            shapes: BTreeMap::new(),
        }
    }

    /// Returns the registered shape of a static source.
    pub fn shape(&self, source: PropertySource) -> Option<&TypeShape> {
        self.shapes.get(&source)
    }

    /// Resolves a qualified name.
    ///
    /// # Errors
    ///
    /// See [`ResolutionError`] for the distinguished reasons.
    pub fn resolve(&self, qualified_name: &str) -> Result<PropertyDescriptor, ResolutionError> {
        if let Some(hit) = self.cached(qualified_name) {
            return Ok(hit);
        }

        let descriptor = self.resolve_uncached(qualified_name)?;

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        cache.insert(qualified_name.to_string(), descriptor.clone());
        Ok(descriptor)
    }

    /// Enumerates every resolvable member of every static source, ordered by
    /// source and then by qualified name.
    pub fn available_properties(&self) -> Vec<PropertyDescriptor> {
        let mut result = Vec::new();
        for (source, shape) in &self.shapes {
            let mut descriptors: Vec<_> = shape
                .members()
                .filter_map(|m| member_descriptor(*source, m))
                .collect();
            descriptors.sort_by(|a, b| a.qualified_name().cmp(b.qualified_name()));
            descriptors.dedup_by(|a, b| a.qualified_name() == b.qualified_name());
            result.extend(descriptors);
        }
        result
    }

    /// Number of memoized resolutions.
    pub fn cached_len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or_else(|e| e.into_inner().len())
    }

    fn cached(&self, qualified_name: &str) -> Option<PropertyDescriptor> {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        cache.get(qualified_name).cloned()
    }

    fn resolve_uncached(&self, name: &str) -> Result<PropertyDescriptor, ResolutionError> {
        let Some((source, plain)) = PropertySource::match_name(name) else {
            info!(
                property = %name,
                "No known source prefix, treating as generic property"
            );
            return Ok(PropertyDescriptor::new(
                PropertySource::Generic,
                name,
                ValueType::Object,
                Accessor::Generic,
            ));
        };

        debug!(property = %name, source = %source, "Resolving property");

        if source.is_effect_group() {
            return resolve_effect(source, name, plain);
        }

        let shape = self.shapes.get(&source).ok_or_else(|| ResolutionError::UnknownPrefix {
            name: name.to_string(),
            prefix: source.prefix().unwrap_or_default().to_string(),
        })?;

        let member = shape.lookup(plain).ok_or_else(|| {
            info!(property = %name, "Property is unknown");
            ResolutionError::MemberNotFound {
                name: name.to_string(),
            }
        })?;

        if member.kind() == MemberKind::Method && member.parameters() > 0 {
            info!(property = %name, "Method with parameters is not supported");
            return Err(ResolutionError::ParameterizedMethod {
                name: name.to_string(),
                parameters: member.parameters(),
            });
        }

        member_descriptor(source, member).ok_or_else(|| {
            info!(property = %name, kind = %member.kind(), "Property type is not supported");
            ResolutionError::UnsupportedType {
                name: name.to_string(),
                kind: member.kind(),
                type_name: member.member_type().type_name(),
            }
        })
    }
}

/// Builder for [`PropertyRegistry`].
pub struct PropertyRegistryBuilder {
    shapes: BTreeMap<PropertySource, TypeShape>,
}

impl PropertyRegistryBuilder {
    /// Registers the backing type of a static source.
    ///
    /// Shapes registered for dynamic sources (generic, effect groups) are
    /// ignored, as those resolve without a member table.
    pub fn source(mut self, source: PropertySource, shape: TypeShape) -> Self {
        if source.is_dynamic() {
            debug!(source = %source, "Ignoring member table for dynamic source");
            return self;
        }
        self.shapes.insert(source, shape);
        self
    }

    pub fn build(self) -> PropertyRegistry {
        PropertyRegistry {
            shapes: self.shapes,
            cache: RwLock::new(HashMap::new()),
        }
    }
}

fn member_descriptor(source: PropertySource, member: &MemberInfo) -> Option<PropertyDescriptor> {
    let (value_type, read) = member.resolvable()?;
    let accessor = match member.kind() {
        MemberKind::Getter => Accessor::Getter(read),
        MemberKind::Field => Accessor::Field(read),
        MemberKind::Method => Accessor::Method(read),
    };
    Some(PropertyDescriptor::new(
        source,
        &source.qualify(member.name()),
        value_type,
        accessor,
    ))
}

fn resolve_effect(
    source: PropertySource,
    name: &str,
    plain: &str,
) -> Result<PropertyDescriptor, ResolutionError> {
    let malformed = || ResolutionError::MalformedEffectName {
        name: name.to_string(),
        prefix: source.prefix().unwrap_or_default().to_string(),
    };

    let (id, attribute) = plain.split_once(PREFIX_SEPARATOR).ok_or_else(malformed)?;
    if id.is_empty() || attribute.is_empty() {
        return Err(malformed());
    }

    let id = Uuid::parse_str(id).map_err(|_| ResolutionError::InvalidUuid {
        name: name.to_string(),
    })?;

    let attribute = EffectAttribute::parse(attribute).ok_or_else(|| {
        ResolutionError::UnknownEffectAttribute {
            name: name.to_string(),
            attribute: attribute.to_string(),
        }
    })?;

    // The container is not required to exist yet; it is looked up per tick.
    Ok(PropertyDescriptor::new(
        source,
        name,
        attribute.value_type(),
        Accessor::EffectAttribute { id, attribute },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::AccessorKind;
    use crate::shape::MemberType;
    use crate::value::PropertyValue;

    struct Status {
        rpms: i32,
        speed: f64,
    }

    struct Game {
        running: bool,
    }

    fn registry() -> PropertyRegistry {
        PropertyRegistry::builder()
            .source(
                PropertySource::StatusData,
                TypeShape::builder::<Status>("StatusData")
                    .getter("Rpms", |s: &Status| s.rpms)
                    .field("SpeedKmh", |s: &Status| s.speed)
                    .method("IsFast", |s: &Status| s.speed > 200.0)
                    .method_with_parameters("GetSector", 1, MemberType::Value(ValueType::Integer))
                    .unsupported(MemberKind::Getter, "SessionTimeLeft", "TimeSpan")
                    .build(),
            )
            .source(
                PropertySource::GameData,
                TypeShape::builder::<Game>("GameData")
                    .getter("GameRunning", |g: &Game| g.running)
                    .build(),
            )
            .build()
    }

    #[test]
    fn test_resolve_getter() {
        let d = registry().resolve("dcp.gd.Rpms").unwrap();
        assert_eq!(d.source(), PropertySource::StatusData);
        assert_eq!(d.accessor_kind(), AccessorKind::Getter);
        assert_eq!(d.value_type(), ValueType::Integer);

        let status = Status { rpms: 1000, speed: 0.0 };
        assert_eq!(d.read(Some(&status)), Ok(Some(PropertyValue::Int(1000))));
    }

    #[test]
    fn test_resolve_field_and_method() {
        let r = registry();
        assert_eq!(
            r.resolve("dcp.gd.SpeedKmh").unwrap().accessor_kind(),
            AccessorKind::Field
        );
        assert_eq!(
            r.resolve("dcp.gd.IsFast").unwrap().accessor_kind(),
            AccessorKind::Method
        );
    }

    #[test]
    fn test_shorter_prefix_used_when_longer_does_not_match() {
        let d = registry().resolve("dcp.GameRunning").unwrap();
        assert_eq!(d.source(), PropertySource::GameData);
    }

    #[test]
    fn test_member_not_found() {
        let err = registry().resolve("dcp.gd.Nope").unwrap_err();
        assert!(matches!(err, ResolutionError::MemberNotFound { .. }));
    }

    #[test]
    fn test_unsupported_type() {
        let err = registry().resolve("dcp.gd.SessionTimeLeft").unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::UnsupportedType { kind: MemberKind::Getter, .. }
        ));
    }

    #[test]
    fn test_parameterized_method() {
        let err = registry().resolve("dcp.gd.GetSector").unwrap_err();
        assert_eq!(
            err,
            ResolutionError::ParameterizedMethod {
                name: "dcp.gd.GetSector".into(),
                parameters: 1
            }
        );
    }

    #[test]
    fn test_unregistered_source_is_unknown_prefix() {
        let err = registry().resolve("acc.physics.SpeedKmh").unwrap_err();
        assert!(matches!(err, ResolutionError::UnknownPrefix { .. }));
    }

    #[test]
    fn test_generic_fallback() {
        let d = registry().resolve("nosuch.prop").unwrap();
        assert_eq!(d.source(), PropertySource::Generic);
        assert_eq!(d.accessor_kind(), AccessorKind::Generic);
        assert_eq!(d.value_type(), ValueType::Object);
    }

    #[test]
    fn test_effect_names() {
        let r = registry();
        let id = "5b6c0fa2-2b41-4a8a-8f1a-3c1d2e4f5a6b";

        let d = r.resolve(&format!("sib.{id}.gain")).unwrap();
        assert_eq!(d.accessor_kind(), AccessorKind::EffectAttribute);
        assert_eq!(d.value_type(), ValueType::Double);

        let d = r.resolve(&format!("sim.{id}.IsMuted")).unwrap();
        assert_eq!(d.source(), PropertySource::ShakeItMotors);
        assert_eq!(d.value_type(), ValueType::Boolean);

        assert!(matches!(
            r.resolve("sib.not-a-uuid.gain"),
            Err(ResolutionError::InvalidUuid { .. })
        ));
        assert!(matches!(
            r.resolve(&format!("sib.{id}.volume")),
            Err(ResolutionError::UnknownEffectAttribute { .. })
        ));
        assert!(matches!(
            r.resolve(&format!("sib.{id}")),
            Err(ResolutionError::MalformedEffectName { .. })
        ));
        assert!(matches!(
            r.resolve(&format!("sib.{id}.")),
            Err(ResolutionError::MalformedEffectName { .. })
        ));
    }

    #[test]
    fn test_resolution_is_memoized() {
        let r = registry();
        assert_eq!(r.cached_len(), 0);
        r.resolve("dcp.gd.Rpms").unwrap();
        r.resolve("dcp.gd.Rpms").unwrap();
        assert_eq!(r.cached_len(), 1);
        let _ = r.resolve("dcp.gd.Nope");
        assert_eq!(r.cached_len(), 1);
    }

    #[test]
    fn test_available_properties_ordered() {
        let names: Vec<_> = registry()
            .available_properties()
            .iter()
            .map(|d| d.qualified_name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "dcp.GameRunning",
                "dcp.gd.IsFast",
                "dcp.gd.Rpms",
                "dcp.gd.SpeedKmh",
            ]
        );
    }

    #[test]
    fn test_dynamic_source_shapes_ignored() {
        let r = PropertyRegistry::builder()
            .source(
                PropertySource::Generic,
                TypeShape::builder::<Game>("Game")
                    .getter("GameRunning", |g: &Game| g.running)
                    .build(),
            )
            .build();
        assert!(r.available_properties().is_empty());
        assert!(r.shape(PropertySource::Generic).is_none());
    }
}
