//! Version-targeted option rewrite rules.
//!
//! Each target version inherits the previous target's table and adds
//! its own entries. Replacement templates may interpolate `${key}` and
//! `${value}`.

use std::collections::HashMap;

use tracing::info;

/// MySQL versions an option file can be upgraded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MySQLTarget {
    #[value(name = "5.1")]
    V51,
    #[value(name = "5.5")]
    V55,
    #[value(name = "5.6")]
    V56,
    #[value(name = "5.7")]
    V57,
}

impl MySQLTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            MySQLTarget::V51 => "5.1",
            MySQLTarget::V55 => "5.5",
            MySQLTarget::V56 => "5.6",
            MySQLTarget::V57 => "5.7",
        }
    }
}

/// Options that legitimately appear multiple times.
pub const MULTI_VALUED_OPTIONS: &[&str] = &[
    "binlog-do-db",
    "binlog-ignore-db",
    "replicate-do-db",
    "replicate-ignore-db",
    "replicate-do-table",
    "replicate-ignore-table",
    "replicate-wild-do-table",
    "replicate-wild-ignore-table",
    "plugin-load",
];

#[derive(Debug, Clone)]
pub enum Rule {
    /// Replace the option with zero or more template lines.
    Replace {
        lines: &'static [&'static str],
        reason: &'static str,
    },
    /// Expand `log-slow-queries` into the 5.1+ slow log options.
    SlowLog { reason: &'static str },
    /// Strip ha_innodb_plugin.so from a plugin-load list.
    InnodbPlugin { reason: &'static str },
}

fn substitute(template: &str, key: &str, value: Option<&str>) -> String {
    template
        .replace("${key}", key)
        .replace("${value}", value.unwrap_or(""))
}

impl Rule {
    pub fn reason(&self) -> &'static str {
        match self {
            Rule::Replace { reason, .. }
            | Rule::SlowLog { reason }
            | Rule::InnodbPlugin { reason } => reason,
        }
    }

    /// Rewrite one occurrence into its replacement lines.
    pub fn rewrite(&self, key: &str, value: Option<&str>) -> Vec<String> {
        let lines = match self {
            Rule::Replace { lines, .. } => lines
                .iter()
                .map(|template| substitute(template, key, value))
                .collect(),
            Rule::SlowLog { .. } => {
                let mut lines = vec!["slow-query-log = 1".to_string()];
                if let Some(value) = value {
                    lines.push(format!("slow-query-log-file = {value}"));
                }
                lines.push("log-slow-slave-statements".to_string());
                lines
            }
            Rule::InnodbPlugin { .. } => {
                let mut plugins = Vec::new();
                for option in value.unwrap_or("").split(';') {
                    if option.is_empty() {
                        continue;
                    }
                    let lib = option.split('=').next_back().unwrap_or(option);
                    if lib != "ha_innodb_plugin.so" {
                        plugins.push(option);
                    }
                }
                if plugins.is_empty() {
                    Vec::new()
                } else {
                    vec![format!("plugin-load = {}", plugins.join(";"))]
                }
            }
        };
        let action = if lines.is_empty() {
            "Removing"
        } else {
            "Rewriting"
        };
        info!("{action} option '{key}'. Reason: {}", self.reason());
        lines
    }
}

fn mysql51_rules() -> HashMap<&'static str, Rule> {
    let mut rules = HashMap::new();
    rules.insert(
        "default-character-set",
        Rule::Replace {
            lines: &["character-set-server = ${value}"],
            reason: "Deprecated in MySQL 5.0 in favor of character-set-server",
        },
    );
    rules.insert(
        "default-collation",
        Rule::Replace {
            lines: &["collation-server = ${value}"],
            reason: "Deprecated in MySQL 4.1.3 in favor of collation-server",
        },
    );
    rules.insert(
        "default-table-type",
        Rule::Replace {
            lines: &["default-storage-engine = ${value}"],
            reason: "Deprecated in MySQL 5.0 in favor of default-storage-engine",
        },
    );
    rules.insert(
        "log-slow-queries",
        Rule::SlowLog {
            reason: "Logging options changed in MySQL 5.1",
        },
    );
    rules.insert(
        "table-cache",
        Rule::Replace {
            lines: &[
                "table-open-cache = ${value}",
                "table-definition-cache = ${value}",
            ],
            reason: "Table cache options changed in MySQL 5.1",
        },
    );
    let removals: &[(&'static str, &'static str)] = &[
        ("enable-pstack", "Deprecated in MySQL 5.1.54"),
        ("log-long-format", "Deprecated in MySQL 4.1"),
        (
            "log-short-format",
            "Deprecated in MySQL 4.1. This option now does nothing.",
        ),
        ("master-connect-retry", "Deprecated in MySQL 5.1.17. Removed in 5.5"),
        ("master-host", "Deprecated in MySQL 5.1.17. Removed in 5.5"),
        ("master-password", "Deprecated in MySQL 5.1.17. Removed in 5.5"),
        ("master-port", "Deprecated in MySQL 5.1.17. Removed in 5.5"),
        ("master-user", "Deprecated in MySQL 5.1.17. Removed in 5.5"),
        ("master-ssl", "Deprecated in MySQL 5.1.17. Removed in 5.5"),
        ("safe-mode", "Deprecated in MySQL 5.0"),
        ("safe-show-database", "Deprecated in MySQL 4.0.2"),
        ("skip-locking", "Deprecated in MySQL 4.0.3. Removed in 5.5"),
        ("skip-external-locking", "Default behavior in MySQL 4.1+"),
        ("skip-bdb", "Removed in MySQL 5.1.11"),
        ("skip-innodb", "Default storage engine in 5.5"),
        ("skip-thread-priority", "Deprecated in MySQL 5.1.29"),
    ];
    for &(option, reason) in removals {
        rules.insert(option, Rule::Replace { lines: &[], reason });
    }
    rules
}

fn mysql55_rules() -> HashMap<&'static str, Rule> {
    let mut rules = mysql51_rules();
    rules.insert(
        "one-thread",
        Rule::Replace {
            lines: &["thread-handling = no-threads"],
            reason: "Deprecated and removed in MySQL 5.6",
        },
    );
    rules.insert(
        "ignore-builtin-innodb",
        Rule::Replace {
            lines: &[],
            reason: "InnoDB plugin is now the default in 5.5",
        },
    );
    rules.insert(
        "plugin-load",
        Rule::InnodbPlugin {
            reason: "InnoDB plugin is now the default in 5.5",
        },
    );
    rules
}

/// Rule table for a target version; later targets inherit from 5.1.
pub fn rules_for(target: MySQLTarget) -> HashMap<&'static str, Rule> {
    match target {
        MySQLTarget::V51 => mysql51_rules(),
        // 5.6 and 5.7 currently carry the same table as 5.5
        MySQLTarget::V55 | MySQLTarget::V56 | MySQLTarget::V57 => mysql55_rules(),
    }
}
