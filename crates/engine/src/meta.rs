use curate_protocol::{Container, Context, MetadataBlock};
use curate_templates::{Namespace, RuleDefinition, Validator};
use serde_json::{Map, Value};

const TEMPLATE_KEY: &str = "template";

/// Matches `context` against the catalog and refreshes the current
/// container's block in place.
///
/// A block that names its template keeps it; `"NA"` and absent blocks are
/// matched again. Fresh blocks are initialized from the context, then
/// filled with defaults, then stamped with the template id. Every
/// `auto_update` property is re-rendered in declaration order, so later
/// templates see earlier results.
pub fn process_matching_templates<'n>(
    context: &mut Context,
    namespace: &'n Namespace,
) -> Option<&'n RuleDefinition> {
    let ns = namespace.name();
    let existing = context.current().and_then(|c| c.block(ns));

    let rule = match existing.as_ref().and_then(MetadataBlock::template) {
        Some(id) => match namespace.definition(id) {
            Some(rule) => Some(rule),
            None => {
                log::debug!("block references unknown template {id}; leaving it untouched");
                return None;
            }
        },
        None => namespace.match_rule(context),
    };

    let Some(rule) = rule else {
        if existing.is_none() {
            if let Some(container) = context.current_mut() {
                container.set_block(ns, MetadataBlock::NotApplicable);
            }
        }
        return None;
    };

    let mut fields = match existing {
        Some(MetadataBlock::Fields(fields)) => fields,
        _ => Map::new(),
    };
    if !fields.contains_key(TEMPLATE_KEY) {
        rule.initialize_properties(&mut fields, &*context);
    }
    rule.fill_defaults(&mut fields);
    fields.insert(TEMPLATE_KEY.to_string(), Value::String(rule.id().to_string()));

    context
        .current_mut()?
        .set_block(ns, MetadataBlock::Fields(fields));

    for (name, spec) in rule.properties() {
        let Some(template) = spec.auto_update.as_ref() else {
            continue;
        };
        let rendered = template.render(&*context);
        if let Some(block) = context
            .current_mut()
            .and_then(|c| c.block_fields_mut(ns))
        {
            block.insert(name.clone(), Value::String(rendered));
        }
    }

    Some(rule)
}

/// Inserts an empty block when none exists; returns whether it did.
pub fn ensure_info_exists(container: &mut Container, namespace: &Namespace) -> bool {
    if container.has_block(namespace.name()) {
        return false;
    }
    container.set_block(namespace.name(), MetadataBlock::Fields(Map::new()));
    true
}

/// Drops the namespace block; returns whether one was present.
pub fn clear_meta_info(container: &mut Container, namespace: &Namespace) -> bool {
    container.clear_block(namespace.name())
}

/// Writes `valid` and `error_message` into the block.
///
/// Missing blocks become `"NA"`; `"NA"` blocks are left alone. Returns the
/// validity written, `None` when nothing was validated.
pub fn validate_meta_info(
    container: &mut Container,
    namespace: &Namespace,
    validator: &Validator,
) -> Option<bool> {
    let ns = namespace.name();
    let block = match container.block(ns) {
        None => {
            container.set_block(ns, MetadataBlock::NotApplicable);
            return None;
        }
        Some(MetadataBlock::NotApplicable) => return None,
        Some(block) => block,
    };

    let (valid, error_message) = match block.template() {
        Some(id) => match namespace.definition(id) {
            Some(rule) => {
                let validation = validator.validate(&block, rule);
                (validation.valid, validation.error_message())
            }
            None => (false, format!("Unknown template: {id}. ")),
        },
        None => (true, String::new()),
    };

    let fields = container.block_fields_mut(ns)?;
    fields.insert("valid".to_string(), Value::Bool(valid));
    fields.insert("error_message".to_string(), Value::String(error_message));
    Some(valid)
}
