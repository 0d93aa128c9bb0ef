use super::{Schema, boolean, float_, icon, one_of, string, update_interval};

/// Options of every component.
#[must_use]
pub fn component_schema() -> Schema {
    Schema::new().optional("setup_priority", float_())
}

/// Options of a component updated on an interval, `default` being the
/// interval used when none is configured.
#[must_use]
pub fn polling_component_schema(default: &'static str) -> Schema {
    component_schema().extend(Schema::new().optional_default(
        "update_interval",
        default,
        update_interval(),
    ))
}

/// Options of every entity.
#[must_use]
pub fn entity_base_schema() -> Schema {
    Schema::new()
        .optional("name", string())
        .optional("internal", boolean())
        .optional("icon", icon())
        .optional_default("disabled_by_default", false, boolean())
        .optional("entity_category", one_of(&["config", "diagnostic"]))
}

#[cfg(test)]
mod tests {
    use crate::registry::ComponentRegistry;
    use crate::schema::{Schema, ValidationContext};
    use crate::target::TargetProfile;
    use crate::types::TypeRegistry;
    use crate::value::{TimePeriod, Value, config_map};

    use super::{entity_base_schema, polling_component_schema};

    fn validate(schema: &Schema, value: Value) -> Result<Value, crate::schema::Invalid> {
        let registry = ComponentRegistry::new(TypeRegistry::new());
        let target = TargetProfile::lookup("host").unwrap();
        let loaded = Default::default();
        let mut cx = ValidationContext::new(&target, &registry, &loaded);
        schema.validate(value, &mut cx)
    }

    #[test]
    fn polling_defaults() {
        let schema = polling_component_schema("60s");
        let config = validate(&schema, Value::Null).unwrap();
        assert_eq!(
            config.as_map().unwrap()["update_interval"],
            Value::TimePeriod(TimePeriod::from_secs(60))
        );

        let mut input = config_map();
        let _ = input.insert("update_interval".into(), "never".into());
        let _ = input.insert("setup_priority".into(), Value::Int(800));
        let config = validate(&schema, Value::Map(input)).unwrap();
        let config = config.as_map().unwrap();
        assert_eq!(
            config["update_interval"].as_time_period().map(|period| period.as_millis()),
            Some(u64::from(u32::MAX))
        );
        assert_eq!(config["setup_priority"].as_f64(), Some(800.0));
    }

    #[test]
    fn entity_options() {
        let mut input = config_map();
        let _ = input.insert("name".into(), "Porch light".into());
        let _ = input.insert("entity_category".into(), "Diagnostic".into());
        let config = validate(&entity_base_schema(), Value::Map(input)).unwrap();
        let config = config.as_map().unwrap();
        assert_eq!(config["entity_category"], Value::String("diagnostic".into()));
        assert_eq!(config["disabled_by_default"], Value::Bool(false));
        assert!(!config.contains_key("internal"));

        let mut input = config_map();
        let _ = input.insert("icon".into(), "home".into());
        let error = validate(&entity_base_schema(), Value::Map(input)).unwrap_err();
        assert_eq!(error.issues()[0].path.to_string(), "icon");
    }
}
