//! Plan-time resolution of the final machine configuration.
//!
//! The resolver reads the caller-supplied config view and writes derived
//! values into the proposed plan. It performs no I/O: the document it writes
//! into `machine_configuration` is exactly what the apply step sends.

use std::fmt;

use machinecfg_patch::PatchError;
use machinecfg_reconcile::ConfigDigest;
use tracing::debug;

use crate::error::ResourceError;
use crate::model::{ApplyMode, Record, Sensitive};
use crate::value::AttrValue;

/// Outcome of a successful planning pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStatus {
    /// `machine_configuration` holds the final document.
    Resolved,

    /// The base document is not known yet; the final document will be
    /// computed on a later pass.
    InputPending,

    /// A value the resolver depends on is not known yet. Nothing was
    /// computed and this is not an error.
    Deferred(DeferReason),
}

/// The attribute that caused resolution to be deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferReason {
    Endpoint,
    Node,
    MachineConfiguration,
    ConfigPatch(usize),
}

impl fmt::Display for DeferReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Endpoint => f.write_str("endpoint"),
            Self::Node => f.write_str("node"),
            Self::MachineConfiguration => f.write_str("machine_configuration"),
            Self::ConfigPatch(index) => write!(f, "config_patches[{index}]"),
        }
    }
}

/// Resolve `plan` from the `config` view.
///
/// `prior` is the persisted state, if the record already exists.
pub fn modify_plan(
    config: &Record,
    prior: Option<&Record>,
    plan: &mut Record,
) -> Result<PlanStatus, ResourceError> {
    if config.machine_configuration.is_known() {
        return Err(ResourceError::ComputedAttributeSet("machine_configuration"));
    }

    match &config.apply_mode {
        AttrValue::Known(mode) => plan.apply_mode = AttrValue::Known(*mode),
        AttrValue::Null => plan.apply_mode = AttrValue::Known(ApplyMode::default()),
        AttrValue::Unknown => plan.apply_mode = AttrValue::Unknown,
    }

    plan.id = match prior.map(|p| &p.id) {
        Some(AttrValue::Known(id)) => AttrValue::Known(id.clone()),
        _ => AttrValue::Unknown,
    };

    let deferred = if config.endpoint.is_unknown() {
        Some(DeferReason::Endpoint)
    } else if config.node.is_unknown() {
        Some(DeferReason::Node)
    } else if config.machine_configuration.is_unknown() {
        Some(DeferReason::MachineConfiguration)
    } else {
        None
    };
    if let Some(reason) = deferred {
        debug!(%reason, "Deferring plan resolution");
        plan.machine_configuration = AttrValue::Unknown;
        return Ok(PlanStatus::Deferred(reason));
    }

    let node = config
        .node
        .known()
        .ok_or(ResourceError::MissingAttribute("node"))?;

    match config.endpoint.known() {
        Some(endpoint) if !endpoint.is_empty() => {
            plan.endpoint = AttrValue::Known(endpoint.clone());
        }
        _ => plan.endpoint = AttrValue::Known(node.clone()),
    }

    let input = match &config.machine_configuration_input {
        AttrValue::Known(input) => input,
        AttrValue::Unknown => {
            plan.machine_configuration = AttrValue::Unknown;
            return Ok(PlanStatus::InputPending);
        }
        AttrValue::Null => {
            return Err(ResourceError::MissingAttribute("machine_configuration_input"));
        }
    };

    let mut patches = Vec::with_capacity(config.config_patches.len());
    for (index, patch) in config.config_patches.iter().enumerate() {
        match patch {
            AttrValue::Known(text) => patches.push(text.as_str()),
            AttrValue::Null => patches.push(""),
            AttrValue::Unknown => {
                let reason = DeferReason::ConfigPatch(index);
                debug!(%reason, "Deferring plan resolution");
                plan.machine_configuration = AttrValue::Unknown;
                return Ok(PlanStatus::Deferred(reason));
            }
        }
    }

    let resolved = resolve_document(input.expose(), &patches)?;
    debug!(
        node = %node,
        patches = patches.len(),
        digest = %ConfigDigest::from_bytes(resolved.as_bytes()),
        "Resolved machine configuration"
    );
    plan.machine_configuration = AttrValue::Known(Sensitive::new(resolved));

    Ok(PlanStatus::Resolved)
}

fn resolve_document(input: &str, patches: &[&str]) -> Result<String, PatchError> {
    let bytes = machinecfg_patch::resolve(input, patches)?;
    String::from_utf8(bytes).map_err(|e| PatchError::Serialize(e.to_string()))
}
