//! Origins of property values and their name prefixes.

use std::fmt;

/// Separator between a source prefix and the member name.
pub const PREFIX_SEPARATOR: char = '.';

/// An origin of property values.
///
/// Each source except [`PropertySource::Generic`] owns a unique name prefix.
/// Prefixes may overlap (`dcp` and `dcp.gd`); matching always prefers the
/// longest one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertySource {
    /// Core game state (`dcp.*`).
    GameData,
    /// Status block of the running game (`dcp.gd.*`).
    StatusData,
    /// Assetto Corsa Competizione raw graphics block (`acc.graphics.*`).
    AccGraphics,
    /// Assetto Corsa Competizione raw physics block (`acc.physics.*`).
    AccPhysics,
    /// ShakeIt Bass effect groups (`sib.<uuid>.<attribute>`).
    ShakeItBass,
    /// ShakeIt Motors effect groups (`sim.<uuid>.<attribute>`).
    ShakeItMotors,
    /// Host key/value property table, used for every unprefixed name.
    Generic,
}

impl PropertySource {
    /// All sources in declaration order.
    pub const ALL: [PropertySource; 7] = [
        Self::GameData,
        Self::StatusData,
        Self::AccGraphics,
        Self::AccPhysics,
        Self::ShakeItBass,
        Self::ShakeItMotors,
        Self::Generic,
    ];

    /// Returns the name prefix, or `None` for the generic fallback.
    pub fn prefix(&self) -> Option<&'static str> {
        match self {
            Self::GameData => Some("dcp"),
            Self::StatusData => Some("dcp.gd"),
            Self::AccGraphics => Some("acc.graphics"),
            Self::AccPhysics => Some("acc.physics"),
            Self::ShakeItBass => Some("sib"),
            Self::ShakeItMotors => Some("sim"),
            Self::Generic => None,
        }
    }

    /// Returns true for sources whose names are resolved against effect groups.
    pub fn is_effect_group(&self) -> bool {
        matches!(self, Self::ShakeItBass | Self::ShakeItMotors)
    }

    /// Returns true for sources without a static member table.
    ///
    /// Dynamic sources are excluded from property discovery.
    pub fn is_dynamic(&self) -> bool {
        self.is_effect_group() || *self == Self::Generic
    }

    /// Returns the prefixed sources sorted by descending prefix length.
    pub fn by_prefix_length() -> Vec<PropertySource> {
        let mut sources: Vec<_> = Self::ALL
            .iter()
            .copied()
            .filter(|s| s.prefix().is_some())
            .collect();
        sources.sort_by_key(|s| std::cmp::Reverse(s.prefix().map(str::len).unwrap_or(0)));
        sources
    }

    /// Finds the source owning `qualified_name` and returns it with the plain
    /// member name that follows the prefix separator.
    ///
    /// Returns `None` if no prefix matches; callers fall back to
    /// [`PropertySource::Generic`].
    pub fn match_name(qualified_name: &str) -> Option<(PropertySource, &str)> {
        Self::by_prefix_length().into_iter().find_map(|source| {
            let prefix = source.prefix()?;
            let rest = qualified_name.strip_prefix(prefix)?;
            let plain = rest.strip_prefix(PREFIX_SEPARATOR)?;
            Some((source, plain))
        })
    }

    /// Builds the qualified name of a member of this source.
    pub fn qualify(&self, plain_name: &str) -> String {
        match self.prefix() {
            Some(prefix) => format!("{prefix}{PREFIX_SEPARATOR}{plain_name}"),
            None => plain_name.to_string(),
        }
    }
}

impl fmt::Display for PropertySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::GameData => "GameData",
            Self::StatusData => "StatusData",
            Self::AccGraphics => "AccGraphics",
            Self::AccPhysics => "AccPhysics",
            Self::ShakeItBass => "ShakeItBass",
            Self::ShakeItMotors => "ShakeItMotors",
            Self::Generic => "Generic",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_prefix_wins() {
        let (source, plain) = PropertySource::match_name("dcp.gd.Rpms").unwrap();
        assert_eq!(source, PropertySource::StatusData);
        assert_eq!(plain, "Rpms");

        let (source, plain) = PropertySource::match_name("dcp.GameRunning").unwrap();
        assert_eq!(source, PropertySource::GameData);
        assert_eq!(plain, "GameRunning");
    }

    #[test]
    fn test_prefix_requires_separator() {
        assert!(PropertySource::match_name("dcpx.Foo").is_none());
        assert!(PropertySource::match_name("dcp").is_none());
        assert!(PropertySource::match_name("simulator.Foo").is_none());
    }

    #[test]
    fn test_unprefixed_names_do_not_match() {
        assert!(PropertySource::match_name("DataCorePlugin.GameRawData").is_none());
        assert!(PropertySource::match_name("nosuch.prop").is_none());
    }

    #[test]
    fn test_by_prefix_length_is_descending() {
        let sources = PropertySource::by_prefix_length();
        assert!(!sources.contains(&PropertySource::Generic));
        let lengths: Vec<_> = sources
            .iter()
            .map(|s| s.prefix().map(str::len).unwrap_or(0))
            .collect();
        assert!(lengths.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_qualify() {
        assert_eq!(PropertySource::StatusData.qualify("Rpms"), "dcp.gd.Rpms");
        assert_eq!(PropertySource::Generic.qualify("Foo.Bar"), "Foo.Bar");
    }

    #[test]
    fn test_dynamic_sources() {
        assert!(PropertySource::Generic.is_dynamic());
        assert!(PropertySource::ShakeItBass.is_dynamic());
        assert!(!PropertySource::AccPhysics.is_dynamic());
    }
}
