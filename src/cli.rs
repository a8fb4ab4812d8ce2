//! Command-line option framework
//!
//! The three binaries share a single-dash, multi-character option
//! surface (`-incl-range`, `-set-free-data`, ...) with three arities:
//! bare flags, single-value options, and options consuming values until
//! the next option token. Declarations are grouped for the help text,
//! and light interdependency rules (excludes / implies) are checked
//! after parsing.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// CLI surface errors; the binaries print these with a usage hint and
/// exit -1.
#[derive(thiserror::Error, Debug)]
pub enum OptionError {
    #[error("Unknown option \"{0}\"")]
    Unknown(String),

    #[error("Option \"{0}\" requires a value")]
    MissingValue(String),

    #[error("Option \"{0}\" must be supplied")]
    MissingRequired(String),

    #[error("Option \"{0}\" cannot be used with option \"{1}\"")]
    Conflict(String, String),

    #[error("Option \"{0}\" requires option \"{1}\"")]
    Requires(String, String),

    #[error("Unexpected argument \"{0}\"")]
    UnexpectedArgument(String),

    #[error("Invalid value \"{value}\" for option \"{option}\": {reason}")]
    InvalidValue {
        option: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arity {
    Flag,
    Single,
    /// Consumes values until the next `-`-prefixed token
    Multi,
}

struct OptionDef {
    name: &'static str,
    group: &'static str,
    description: &'static str,
    arity: Arity,
    required: bool,
    default_value: Option<&'static str>,
}

/// Declared options plus, after [`OptionSet::parse`], their values
pub struct OptionSet {
    program: &'static str,
    defs: Vec<OptionDef>,
    current_group: &'static str,
    excludes: Vec<(&'static str, &'static str)>,
    group_excludes: Vec<(&'static str, &'static str)>,
    implies: Vec<(&'static str, &'static str)>,
    /// Name of the option a leading positional argument stands for
    positional_alias: Option<&'static str>,
    values: HashMap<&'static str, Vec<String>>,
}

impl OptionSet {
    #[must_use]
    pub fn new(program: &'static str) -> Self {
        let mut set = Self {
            program,
            defs: Vec::new(),
            current_group: "Options",
            excludes: Vec::new(),
            group_excludes: Vec::new(),
            implies: Vec::new(),
            positional_alias: None,
            values: HashMap::new(),
        };
        set.flag("-help", "Print this usage information and exit.");
        set
    }

    /// Starts a new declaration group for the help text.
    pub fn group(&mut self, name: &'static str) -> &mut Self {
        self.current_group = name;
        self
    }

    pub fn flag(&mut self, name: &'static str, description: &'static str) -> &mut Self {
        self.declare(name, description, Arity::Flag)
    }

    pub fn single(&mut self, name: &'static str, description: &'static str) -> &mut Self {
        self.declare(name, description, Arity::Single)
    }

    pub fn multi(&mut self, name: &'static str, description: &'static str) -> &mut Self {
        self.declare(name, description, Arity::Multi)
    }

    fn declare(
        &mut self,
        name: &'static str,
        description: &'static str,
        arity: Arity,
    ) -> &mut Self {
        self.defs.push(OptionDef {
            name,
            group: self.current_group,
            description,
            arity,
            required: false,
            default_value: None,
        });
        self
    }

    /// Marks the most recently declared option as required.
    pub fn required(&mut self) -> &mut Self {
        self.defs.last_mut().expect("no option declared").required = true;
        self
    }

    /// Sets a default for the most recently declared option.
    pub fn default_value(&mut self, value: &'static str) -> &mut Self {
        self.defs.last_mut().expect("no option declared").default_value = Some(value);
        self
    }

    /// Lets a leading non-option argument stand for `option`.
    pub fn positional_alias(&mut self, option: &'static str) -> &mut Self {
        self.positional_alias = Some(option);
        self
    }

    pub fn option_excludes_option(&mut self, a: &'static str, b: &'static str) -> &mut Self {
        self.excludes.push((a, b));
        self
    }

    pub fn option_excludes_group(&mut self, option: &'static str, group: &'static str) -> &mut Self {
        self.group_excludes.push((option, group));
        self
    }

    pub fn option_implies_option(&mut self, a: &'static str, b: &'static str) -> &mut Self {
        self.implies.push((a, b));
        self
    }

    fn def(&self, name: &str) -> Option<&OptionDef> {
        self.defs.iter().find(|d| d.name == name)
    }

    /// Parses `args` (without the program name).
    pub fn parse(&mut self, args: &[String]) -> Result<(), OptionError> {
        let mut i = 0;
        while i < args.len() {
            let token = &args[i];
            if let Some(def) = self.def(token) {
                let name = def.name;
                let arity = def.arity;
                i += 1;
                match arity {
                    Arity::Flag => {
                        self.values.entry(name).or_default();
                    }
                    Arity::Single => {
                        if i >= args.len() || self.def(&args[i]).is_some() {
                            return Err(OptionError::MissingValue(token.clone()));
                        }
                        self.values.entry(name).or_default().push(args[i].clone());
                        i += 1;
                    }
                    Arity::Multi => {
                        let slot = self.values.entry(name).or_default();
                        while i < args.len() && !args[i].starts_with('-') {
                            slot.push(args[i].clone());
                            i += 1;
                        }
                    }
                }
            } else if token.starts_with('-') {
                return Err(OptionError::Unknown(token.clone()));
            } else if let Some(alias) = self.positional_alias {
                if self.values.contains_key(alias) {
                    return Err(OptionError::UnexpectedArgument(token.clone()));
                }
                self.values.entry(alias).or_default().push(token.clone());
                i += 1;
            } else {
                return Err(OptionError::UnexpectedArgument(token.clone()));
            }
        }

        if self.check("-help") {
            return Ok(());
        }
        self.validate()
    }

    fn validate(&self) -> Result<(), OptionError> {
        for def in &self.defs {
            if def.required && !self.values.contains_key(def.name) {
                return Err(OptionError::MissingRequired(def.name.to_string()));
            }
        }
        for (a, b) in &self.excludes {
            if self.check(a) && self.check(b) {
                return Err(OptionError::Conflict((*a).into(), (*b).into()));
            }
        }
        for (option, group) in &self.group_excludes {
            if !self.check(option) {
                continue;
            }
            for def in self.defs.iter().filter(|d| d.group == *group) {
                if self.check(def.name) {
                    return Err(OptionError::Conflict(
                        (*option).into(),
                        def.name.to_string(),
                    ));
                }
            }
        }
        for (a, b) in &self.implies {
            if self.check(a) && !self.check(b) {
                return Err(OptionError::Requires((*a).into(), (*b).into()));
            }
        }
        Ok(())
    }

    /// Whether the option was supplied on the command line
    #[must_use]
    pub fn check(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Supplied value, falling back to the declared default
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        if let Some(values) = self.values.get(name) {
            return values.first().cloned();
        }
        self.def(name)
            .and_then(|d| d.default_value)
            .map(String::from)
    }

    /// All supplied values of a multi-value option
    #[must_use]
    pub fn values(&self, name: &str) -> Vec<String> {
        self.values.get(name).cloned().unwrap_or_default()
    }

    /// Grouped usage text
    #[must_use]
    pub fn usage(&self) -> String {
        let mut out = format!("Usage: {} <options>\n", self.program);
        let mut seen_groups: Vec<&'static str> = Vec::new();
        for def in &self.defs {
            if !seen_groups.contains(&def.group) {
                seen_groups.push(def.group);
            }
        }
        for group in seen_groups {
            let _ = write!(out, "\n{group}:\n");
            for def in self.defs.iter().filter(|d| d.group == group) {
                let suffix = match def.arity {
                    Arity::Flag => "",
                    Arity::Single => " <value>",
                    Arity::Multi => " <value>...",
                };
                let _ = write!(out, "  {}{}\n      {}", def.name, suffix, def.description);
                if let Some(default) = def.default_value {
                    let _ = write!(out, " Defaults to \"{default}\".");
                }
                out.push('\n');
            }
        }
        out
    }
}

/// Replaces any value naming a readable file with the whitespace-
/// separated tokens it contains, then sorts and deduplicates the lot.
pub fn collect_unique_ids(values: &[String]) -> std::io::Result<Vec<String>> {
    let mut out = Vec::new();
    for value in values {
        if Path::new(value).is_file() {
            let contents = fs::read_to_string(value)?;
            out.extend(contents.split_whitespace().map(String::from));
        } else {
            out.push(value.clone());
        }
    }
    out.sort();
    out.dedup();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| (*t).to_string()).collect()
    }

    fn bgenix_like() -> OptionSet {
        let mut options = OptionSet::new("bgenix");
        options
            .group("Input / output file options")
            .single("-g", "Path of bgen file to operate on.")
            .required();
        options.single("-i", "Path of index file to use.");
        options
            .single("-table", "Table to read the index from.")
            .default_value("Variant");
        options.group("Indexing options").flag("-index", "Build an index.");
        options.flag("-clobber", "Overwrite an existing index file.");
        options
            .group("Variant selection options")
            .multi("-incl-range", "Include variants in ranges.");
        options.multi("-incl-rsids", "Include variants by rsid.");
        options.group("Output options").flag("-list", "List variants.");
        options.flag("-v11", "Transcode to BGEN v1.1.");
        options
            .single("-compression-level", "Zlib level.")
            .default_value("9");
        options.positional_alias("-g");
        options.option_excludes_group("-index", "Variant selection options");
        options.option_excludes_group("-index", "Output options");
        options.option_excludes_option("-list", "-v11");
        options.option_implies_option("-clobber", "-index");
        options.option_implies_option("-compression-level", "-v11");
        options
    }

    #[test]
    fn test_flags_and_values() {
        let mut options = bgenix_like();
        options
            .parse(&args(&["-g", "f.bgen", "-index", "-clobber"]))
            .unwrap();
        assert!(options.check("-index"));
        assert!(options.check("-clobber"));
        assert_eq!(options.get("-g").unwrap(), "f.bgen");
        // default applies without being "supplied"
        assert!(!options.check("-table"));
        assert_eq!(options.get("-table").unwrap(), "Variant");
    }

    #[test]
    fn test_multi_values_stop_at_next_option() {
        let mut options = bgenix_like();
        options
            .parse(&args(&[
                "-g",
                "f.bgen",
                "-incl-range",
                "01:100-200",
                "02:-500",
                "-list",
            ]))
            .unwrap();
        assert_eq!(options.values("-incl-range"), ["01:100-200", "02:-500"]);
        assert!(options.check("-list"));
    }

    #[test]
    fn test_positional_stands_for_g() {
        let mut options = bgenix_like();
        options.parse(&args(&["f.bgen", "-list"])).unwrap();
        assert_eq!(options.get("-g").unwrap(), "f.bgen");
    }

    #[test]
    fn test_missing_required() {
        let mut options = bgenix_like();
        let err = options.parse(&args(&["-list"])).unwrap_err();
        assert!(matches!(err, OptionError::MissingRequired(name) if name == "-g"));
    }

    #[test]
    fn test_unknown_option() {
        let mut options = bgenix_like();
        let err = options.parse(&args(&["-g", "f.bgen", "-frobnicate"])).unwrap_err();
        assert!(matches!(err, OptionError::Unknown(_)));
    }

    #[test]
    fn test_single_requires_value() {
        let mut options = bgenix_like();
        let err = options.parse(&args(&["-g"])).unwrap_err();
        assert!(matches!(err, OptionError::MissingValue(_)));
    }

    #[test]
    fn test_index_excludes_selection_and_output() {
        let mut options = bgenix_like();
        let err = options
            .parse(&args(&["-g", "f.bgen", "-index", "-list"]))
            .unwrap_err();
        assert!(matches!(err, OptionError::Conflict(_, _)));

        let mut options = bgenix_like();
        let err = options
            .parse(&args(&["-g", "f.bgen", "-index", "-incl-rsids", "rs1"]))
            .unwrap_err();
        assert!(matches!(err, OptionError::Conflict(_, _)));
    }

    #[test]
    fn test_list_excludes_v11() {
        let mut options = bgenix_like();
        let err = options
            .parse(&args(&["-g", "f.bgen", "-list", "-v11"]))
            .unwrap_err();
        assert!(matches!(err, OptionError::Conflict(_, _)));
    }

    #[test]
    fn test_clobber_implies_index() {
        let mut options = bgenix_like();
        let err = options.parse(&args(&["-g", "f.bgen", "-clobber"])).unwrap_err();
        assert!(matches!(err, OptionError::Requires(_, _)));
    }

    #[test]
    fn test_help_skips_validation() {
        let mut options = bgenix_like();
        options.parse(&args(&["-help"])).unwrap();
        assert!(options.check("-help"));
        let usage = options.usage();
        assert!(usage.contains("Variant selection options"));
        assert!(usage.contains("-incl-range"));
    }

    #[test]
    fn test_collect_unique_ids_inline() {
        let ids = collect_unique_ids(&args(&["rs2", "rs1", "rs2"])).unwrap();
        assert_eq!(ids, ["rs1", "rs2"]);
    }

    #[test]
    fn test_collect_unique_ids_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("ids.txt");
        std::fs::write(&list, "rs9 rs3\nrs5\t rs3").unwrap();
        let ids = collect_unique_ids(&[
            list.to_string_lossy().into_owned(),
            "rs1".to_string(),
        ])
        .unwrap();
        assert_eq!(ids, ["rs1", "rs3", "rs5", "rs9"]);
    }
}
