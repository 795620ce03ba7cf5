use std::collections::HashMap;

use crate::errors::CliError;

/// Flags that never take a value.
const SWITCHES: [&str; 3] = ["rescan", "tags", "json"];
/// Options that may be given more than once.
const REPEATABLE: [&str; 1] = ["tag"];

/// Command arguments split into positionals, `--key value` options and switches.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedArgs {
    positionals: Vec<String>,
    options: HashMap<String, Vec<String>>,
    switches: Vec<String>,
}

impl ParsedArgs {
    pub fn parse(args: &[&str]) -> Result<Self, CliError> {
        let mut parsed = Self::default();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let Some(key) = arg.strip_prefix("--") else {
                parsed.positionals.push((*arg).to_string());
                continue;
            };
            if key.is_empty() {
                return Err(CliError::input("empty option name"));
            }
            if SWITCHES.contains(&key) {
                parsed.switches.push(key.to_string());
                continue;
            }
            let value = iter
                .next()
                .ok_or_else(|| CliError::input(format!("option --{key} needs a value")))?;
            let values = parsed.options.entry(key.to_string()).or_default();
            if !values.is_empty() && !REPEATABLE.contains(&key) {
                return Err(CliError::input(format!("option --{key} given twice")));
            }
            values.push((*value).to_string());
        }
        Ok(parsed)
    }

    pub fn positionals(&self) -> &[String] {
        &self.positionals
    }

    pub fn positional(&self, idx: usize, name: &str) -> Result<&str, CliError> {
        self.positionals
            .get(idx)
            .map(String::as_str)
            .ok_or_else(|| CliError::input(format!("missing <{name}>")))
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn all(&self, key: &str) -> Vec<String> {
        self.options.get(key).cloned().unwrap_or_default()
    }

    pub fn switch(&self, key: &str) -> bool {
        self.switches.iter().any(|name| name == key)
    }

    /// Rejects options the command does not understand.
    pub fn expect_only(&self, known: &[&str]) -> Result<(), CliError> {
        let unknown = self
            .options
            .keys()
            .chain(self.switches.iter())
            .find(|key| !known.contains(&key.as_str()));
        match unknown {
            Some(key) => Err(CliError::input(format!("unknown option --{key}"))),
            None => Ok(()),
        }
    }

    pub fn parse_option<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, CliError> {
        self.option(key)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|_| CliError::input(format!("invalid value `{raw}` for --{key}")))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_positionals_options_and_switches() {
        let parsed = ParsedArgs::parse(&[
            "Home", "12.50", "--tag", "food", "--rescan", "--tag", "market", "--note", "weekly",
        ])
        .unwrap();
        assert_eq!(parsed.positionals(), ["Home", "12.50"]);
        assert_eq!(parsed.all("tag"), vec!["food", "market"]);
        assert_eq!(parsed.option("note"), Some("weekly"));
        assert!(parsed.switch("rescan"));
        assert!(!parsed.switch("json"));
        assert!(parsed.expect_only(&["tag", "note", "rescan"]).is_ok());
        assert!(parsed.expect_only(&["tag"]).is_err());
    }

    #[test]
    fn rejects_missing_values_and_duplicates() {
        assert!(ParsedArgs::parse(&["--at"]).is_err());
        assert!(ParsedArgs::parse(&["--at", "2024-01-01", "--at", "2024-01-02"]).is_err());
        let parsed = ParsedArgs::parse(&["--limit", "x"]).unwrap();
        assert!(parsed.parse_option::<usize>("limit").is_err());
        assert_eq!(parsed.parse_option::<usize>("top").unwrap(), None);
    }
}
