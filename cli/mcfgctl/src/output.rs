//! Output formatting for CLI commands.

use colored::Colorize;
use machinecfg_reconcile::ConfigDigest;
use machinecfg_resource::{AttrValue, Record, Sensitive};

/// What applying a plan would do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    NoOp,
}

impl Action {
    pub fn between(prior: Option<&Record>, plan: &Record) -> Self {
        match prior {
            None => Self::Create,
            Some(prior) if prior == plan => Self::NoOp,
            Some(_) => Self::Update,
        }
    }
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", "Success:".green().bold(), message);
}

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", "Info:".blue().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "Warning:".yellow().bold(), message);
}

/// Print the attribute-level change between prior state and plan.
pub fn print_plan(type_name: &str, prior: Option<&Record>, plan: &Record) {
    let action = Action::between(prior, plan);
    let header = match action {
        Action::Create => format!("+ {type_name} will be created").as_str().green(),
        Action::Update => format!("~ {type_name} will be updated").as_str().yellow(),
        Action::NoOp => {
            print_info("No changes. The node configuration matches the state.");
            return;
        }
    };
    println!("{}", header.bold());

    let before = prior.map(attribute_rows).unwrap_or_default();
    for (name, after) in attribute_rows(plan) {
        let old = before
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str());

        match old {
            Some(old) if old == after => println!("    {name:<30} = {after}"),
            Some(old) => println!(
                "  {} {name:<30} = {} -> {}",
                "~".yellow(),
                old.dimmed(),
                after
            ),
            None => println!("  {} {name:<30} = {after}", "+".green()),
        }
    }
}

/// Render each attribute as a name and a display value.
///
/// Sensitive values are shown as digests.
pub fn attribute_rows(record: &Record) -> Vec<(String, String)> {
    let mut rows = vec![
        ("id".to_string(), plain(&record.id)),
        (
            "apply_mode".to_string(),
            plain(&record.apply_mode.as_ref().map(|m| m.to_string())),
        ),
        ("node".to_string(), plain(&record.node)),
        ("endpoint".to_string(), plain(&record.endpoint)),
        (
            "client_configuration".to_string(),
            match &record.client_configuration {
                AttrValue::Known(cc) => {
                    let digest = ConfigDigest::from_bytes(
                        format!(
                            "{}\n{}\n{}",
                            cc.ca_certificate,
                            cc.client_certificate,
                            cc.client_key.expose()
                        )
                        .as_bytes(),
                    );
                    format!("(sensitive {digest})")
                }
                AttrValue::Null => "null".to_string(),
                AttrValue::Unknown => "(known after apply)".to_string(),
            },
        ),
        (
            "machine_configuration_input".to_string(),
            sensitive(&record.machine_configuration_input),
        ),
        (
            "machine_configuration".to_string(),
            sensitive(&record.machine_configuration),
        ),
    ];

    for (index, patch) in record.config_patches.iter().enumerate() {
        let value = match patch {
            AttrValue::Known(text) => ConfigDigest::from_bytes(text.as_bytes()).to_string(),
            AttrValue::Null => "null".to_string(),
            AttrValue::Unknown => "(known after apply)".to_string(),
        };
        rows.push((format!("config_patches[{index}]"), value));
    }

    rows.push((
        "timeouts.create".to_string(),
        record.timeouts.create.clone().unwrap_or_else(|| "null".to_string()),
    ));
    rows.push((
        "timeouts.update".to_string(),
        record.timeouts.update.clone().unwrap_or_else(|| "null".to_string()),
    ));

    rows
}

fn plain<T: AsRef<str>>(value: &AttrValue<T>) -> String {
    match value {
        AttrValue::Known(v) => format!("{:?}", v.as_ref()),
        AttrValue::Null => "null".to_string(),
        AttrValue::Unknown => "(known after apply)".to_string(),
    }
}

fn sensitive(value: &AttrValue<Sensitive>) -> String {
    match value {
        AttrValue::Known(v) => format!(
            "(sensitive {})",
            ConfigDigest::from_bytes(v.expose().as_bytes())
        ),
        AttrValue::Null => "null".to_string(),
        AttrValue::Unknown => "(known after apply)".to_string(),
    }
}
