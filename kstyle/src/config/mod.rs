//! Configuration resolver.
//!
//! Properties arrive as pre-cascaded string key/value maps from an external
//! collaborator (an `.editorconfig`-style loader). Resolution order is:
//! explicit override > raw file property > code-style default > global
//! default. Every property is parsed to a concrete typed value before any
//! rule sees it; invalid values fall back to the documented default and are
//! surfaced as warning-level [`ConfigError`]s distinct from lint violations.

use rustc_hash::{FxHashMap, FxHashSet};

/// Property key selecting the active code style.
pub const CODE_STYLE_PROPERTY: &str = "kstyle_code_style";
/// Property key for the maximum line length (`off`/`unset` disables it).
pub const MAX_LINE_LENGTH_PROPERTY: &str = "max_line_length";
/// Property key for the indent width in spaces.
pub const INDENT_SIZE_PROPERTY: &str = "indent_size";
/// Property key for the indent style (`space` or `tab`).
pub const INDENT_STYLE_PROPERTY: &str = "indent_style";
/// Property key for the force-multiline parameter-count threshold.
pub const FORCE_MULTILINE_PROPERTY: &str =
    "kstyle_argument_list_wrapping_force_multiline_when_parameter_count_greater_or_equal_than";

/// Sentinel for numeric properties set to `unset`/`off`: the threshold is
/// effectively infinite and never triggers.
pub const UNSET_INT: usize = i32::MAX as usize;

/// Named bundle of default property values selectable by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodeStyle {
    /// The style enforced by this project's own ruleset.
    #[default]
    KstyleOfficial,
    /// IntelliJ IDEA default formatting.
    IntellijIdea,
    /// Android Studio formatting.
    AndroidStudio,
}

impl CodeStyle {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "kstyle_official" => Some(Self::KstyleOfficial),
            "intellij_idea" => Some(Self::IntellijIdea),
            "android_studio" => Some(Self::AndroidStudio),
            _ => None,
        }
    }
}

/// Indentation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndentStyle {
    /// Indent with spaces.
    #[default]
    Space,
    /// Indent with tab characters.
    Tab,
}

/// Error resolving a single configuration property.
///
/// Resolution always recovers by falling back to the property's documented
/// default; the error is reported as a warning-level diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The value could not be parsed as a positive integer.
    #[error("property '{property}' has invalid value '{value}': expected a positive integer")]
    InvalidInt {
        /// Property name.
        property: String,
        /// Offending literal.
        value: String,
    },
    /// The value parsed but falls outside the supported range.
    #[error("property '{property}' has value '{value}' outside the supported range")]
    OutOfRange {
        /// Property name.
        property: String,
        /// Offending literal.
        value: String,
    },
    /// The value is not one of the property's accepted names.
    #[error("property '{property}' has unknown value '{value}'")]
    UnknownValue {
        /// Property name.
        property: String,
        /// Offending literal.
        value: String,
    },
}

/// Fully resolved, typed configuration for one file.
///
/// Threaded as an explicit parameter into every rule invocation and the
/// scheduler; never a process-wide singleton, so per-file parallelism stays
/// safe.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The active code style.
    pub code_style: CodeStyle,
    /// Maximum line length; [`UNSET_INT`] when disabled.
    pub max_line_length: usize,
    /// Indent width in columns.
    pub indent_size: usize,
    /// Indent unit style.
    pub indent_style: IndentStyle,
    /// Wrap a list to one item per line once it has at least this many
    /// items; [`UNSET_INT`] disables the threshold.
    pub force_multiline_when_parameter_count_greater_or_equal_than: usize,
    /// Rule ids (`ruleset:name`) disabled via `kstyle_<ruleset>_<name>` keys.
    disabled_rules: FxHashSet<String>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        resolve(&FxHashMap::default(), &FxHashMap::default()).0
    }
}

impl ResolvedConfig {
    /// One unit of indentation as a string.
    #[must_use]
    pub fn indent_unit(&self) -> String {
        match self.indent_style {
            IndentStyle::Space => " ".repeat(self.indent_size),
            IndentStyle::Tab => "\t".to_owned(),
        }
    }

    /// Whether a maximum line length is enforced.
    #[must_use]
    pub fn max_line_length_set(&self) -> bool {
        self.max_line_length < UNSET_INT
    }

    /// Whether the rule with the given `ruleset:name` id is enabled.
    #[must_use]
    pub fn rule_enabled(&self, rule_id: &str) -> bool {
        !self.disabled_rules.contains(rule_id)
    }
}

fn is_registered_property(key: &str) -> bool {
    matches!(
        key,
        CODE_STYLE_PROPERTY
            | MAX_LINE_LENGTH_PROPERTY
            | INDENT_SIZE_PROPERTY
            | INDENT_STYLE_PROPERTY
            | FORCE_MULTILINE_PROPERTY
    )
}

/// Resolves the typed configuration for one file from layered string maps.
///
/// `overrides` (e.g. from a test harness or the embedding driver) win over
/// `raw` (the cascaded `.editorconfig`-style values); unresolved properties
/// fall back to code-style-specific and then global defaults.
#[must_use]
pub fn resolve(
    overrides: &FxHashMap<String, String>,
    raw: &FxHashMap<String, String>,
) -> (ResolvedConfig, Vec<ConfigError>) {
    let mut warnings = Vec::new();
    let lookup = |key: &str| overrides.get(key).or_else(|| raw.get(key));

    let code_style = match lookup(CODE_STYLE_PROPERTY) {
        Some(value) => CodeStyle::parse(value).unwrap_or_else(|| {
            warnings.push(ConfigError::UnknownValue {
                property: CODE_STYLE_PROPERTY.to_owned(),
                value: value.clone(),
            });
            CodeStyle::default()
        }),
        None => CodeStyle::default(),
    };

    // max_line_length: the official style enforces 140, other styles leave
    // it off unless configured.
    let max_line_length_default = match code_style {
        CodeStyle::KstyleOfficial => 140,
        CodeStyle::IntellijIdea | CodeStyle::AndroidStudio => UNSET_INT,
    };
    let max_line_length = resolve_int(
        lookup(MAX_LINE_LENGTH_PROPERTY),
        MAX_LINE_LENGTH_PROPERTY,
        max_line_length_default,
        &mut warnings,
    );

    let indent_size = resolve_int(
        lookup(INDENT_SIZE_PROPERTY),
        INDENT_SIZE_PROPERTY,
        4,
        &mut warnings,
    );

    let indent_style = match lookup(INDENT_STYLE_PROPERTY) {
        Some(value) => match value.as_str() {
            "space" => IndentStyle::Space,
            "tab" => IndentStyle::Tab,
            _ => {
                warnings.push(ConfigError::UnknownValue {
                    property: INDENT_STYLE_PROPERTY.to_owned(),
                    value: value.clone(),
                });
                IndentStyle::default()
            }
        },
        None => IndentStyle::default(),
    };

    // Historically, non-official styles have used 8 as the magic value; the
    // official style never forces wrapping based on count alone.
    let force_multiline_default = match code_style {
        CodeStyle::KstyleOfficial => UNSET_INT,
        CodeStyle::IntellijIdea | CodeStyle::AndroidStudio => 8,
    };
    let force_multiline = resolve_int(
        lookup(FORCE_MULTILINE_PROPERTY),
        FORCE_MULTILINE_PROPERTY,
        force_multiline_default,
        &mut warnings,
    );

    let mut disabled_rules = FxHashSet::default();
    for (key, value) in raw.iter().chain(overrides.iter()) {
        if let Some(rule_id) = rule_key_to_id(key) {
            match value.as_str() {
                "disabled" => {
                    disabled_rules.insert(rule_id);
                }
                "enabled" => {
                    disabled_rules.remove(&rule_id);
                }
                _ => warnings.push(ConfigError::UnknownValue {
                    property: key.clone(),
                    value: value.clone(),
                }),
            }
        }
    }

    (
        ResolvedConfig {
            code_style,
            max_line_length,
            indent_size,
            indent_style,
            force_multiline_when_parameter_count_greater_or_equal_than: force_multiline,
            disabled_rules,
        },
        warnings,
    )
}

/// Maps a `kstyle_<ruleset>_<rule-name>` enablement key to `ruleset:name`.
fn rule_key_to_id(key: &str) -> Option<String> {
    if is_registered_property(key) {
        return None;
    }
    let rest = key.strip_prefix("kstyle_")?;
    let (ruleset, name) = rest.split_once('_')?;
    Some(format!("{ruleset}:{name}"))
}

/// Parses a positive-int-or-sentinel property value. Accepts `unset` and
/// `off` as the effectively-infinite sentinel.
fn resolve_int(
    value: Option<&String>,
    property: &str,
    default: usize,
    warnings: &mut Vec<ConfigError>,
) -> usize {
    let Some(value) = value else {
        return default;
    };
    if value == "unset" || value == "off" {
        return UNSET_INT;
    }
    match value.parse::<i64>() {
        Ok(parsed) if parsed > i64::from(i32::MAX) => {
            warnings.push(ConfigError::OutOfRange {
                property: property.to_owned(),
                value: value.clone(),
            });
            default
        }
        Ok(parsed) if parsed <= 0 => {
            warnings.push(ConfigError::OutOfRange {
                property: property.to_owned(),
                value: value.clone(),
            });
            default
        }
        Ok(parsed) => usize::try_from(parsed).unwrap_or(default),
        Err(_) => {
            warnings.push(ConfigError::InvalidInt {
                property: property.to_owned(),
                value: value.clone(),
            });
            default
        }
    }
}
