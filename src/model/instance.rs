//! 模型实例与枚举还原

use crate::error::DualDbResult;
use crate::model::definition::ModelDefinition;
use crate::model::enum_types::EnumDefinition;
use crate::types::{DataValue, Record};
use std::collections::HashMap;
use std::sync::Arc;

/// 行形态的模型实例，构造时以模型默认值填充
#[derive(Debug, Clone)]
pub struct ModelInstance {
    model: Arc<ModelDefinition>,
    values: Record,
}

impl ModelInstance {
    /// 以默认值创建实例
    pub fn new(model: &Arc<ModelDefinition>) -> Self {
        Self {
            model: Arc::clone(model),
            values: model.headers_default().into_iter().collect(),
        }
    }

    /// 所属模型
    pub fn model(&self) -> &Arc<ModelDefinition> {
        &self.model
    }

    /// 读取字段值
    pub fn get(&self, field: &str) -> Option<&DataValue> {
        self.values.get(field)
    }

    /// 设置字段值，字段必须已声明
    pub fn set(&mut self, field: &str, value: impl Into<DataValue>) -> DualDbResult<()> {
        if self.model.field(field).is_none() {
            return Err(crate::dual_error!(
                validation,
                field,
                format!("{} has no field {}", self.model.name(), field)
            ));
        }
        self.values.insert(field.to_string(), value.into());
        Ok(())
    }

    /// 转换为写入用的记录，只包含已声明且已有值的列
    pub fn to_table_format(&self) -> Record {
        self.model
            .headers()
            .into_iter()
            .filter_map(|header| {
                self.values
                    .get(&header)
                    .map(|value| (header.clone(), value.clone()))
            })
            .collect()
    }

    /// 由查询结果行构建实例，忽略未声明的列
    pub fn from_table_format(
        model: &Arc<ModelDefinition>,
        rows: &[HashMap<String, DataValue>],
    ) -> Vec<ModelInstance> {
        rows.iter()
            .map(|row| {
                let mut instance = ModelInstance::new(model);
                for (key, value) in row {
                    if model.field(key).is_some() {
                        instance.values.insert(key.clone(), value.clone());
                    }
                }
                instance
            })
            .collect()
    }

    /// 检查必填字段都有非空值
    pub fn validate_required(&self) -> DualDbResult<()> {
        for header in self.model.required_headers() {
            match self.values.get(&header) {
                Some(value) if !value.is_null() => {}
                _ => {
                    return Err(crate::dual_error!(
                        validation,
                        header,
                        "required field is empty"
                    ))
                }
            }
        }
        Ok(())
    }
}

/// 把行中存储的枚举值还原为声明的枚举成员
///
/// `columns` 为 None 时使用模型中引用枚举的全部列
pub fn restore_enums(
    model: &ModelDefinition,
    rows: &mut [HashMap<String, DataValue>],
    columns: Option<&[&str]>,
) -> DualDbResult<()> {
    let enum_columns = model.enum_columns();
    let targets: Vec<(String, Arc<EnumDefinition>)> = match columns {
        None => enum_columns,
        Some(columns) => columns
            .iter()
            .map(|column| {
                enum_columns
                    .iter()
                    .find(|(name, _)| name == column)
                    .cloned()
                    .ok_or_else(|| {
                        crate::dual_error!(
                            validation,
                            column,
                            format!("{} is not an enum column of {}", column, model.name())
                        )
                    })
            })
            .collect::<DualDbResult<_>>()?,
    };

    for row in rows.iter_mut() {
        for (column, definition) in &targets {
            let Some(value) = row.get_mut(column) else {
                continue;
            };
            let restored = match value {
                DataValue::Null | DataValue::Enum(_) => continue,
                DataValue::String(stored) => definition.by_value(stored).cloned().ok_or_else(|| {
                    crate::dual_error!(
                        validation,
                        column,
                        format!("stored value '{}' is not a member of {}", stored, definition.name())
                    )
                })?,
                other => {
                    return Err(crate::dual_error!(
                        validation,
                        column,
                        format!("expected enum text, got {}", other.type_name())
                    ))
                }
            };
            *value = DataValue::Enum(restored);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::convenience::*;
    use crate::model::{ModelBuilder, ModelMeta};

    fn person_model() -> Arc<ModelDefinition> {
        let mood = ModelBuilder::new("Mood", ModelMeta::enumeration(&["public"], "mood"))
            .enum_value("HAPPY", "happy")
            .enum_value("SAD", "sad")
            .build()
            .unwrap();
        ModelBuilder::new("Person", ModelMeta::table(&["public"], "person"))
            .field("id", serial_field())
            .field("name", text_field().required())
            .field("mood", enum_field(mood.enum_definition().unwrap()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_instance_defaults_and_set() {
        let model = person_model();
        let mut instance = ModelInstance::new(&model);
        assert_eq!(instance.get("name"), Some(&DataValue::Null));
        assert!(instance.get("id").is_none());
        assert!(instance.validate_required().is_err());

        instance.set("name", "x").unwrap();
        assert!(instance.validate_required().is_ok());
        assert!(instance.set("age", 3).is_err());

        let record = instance.to_table_format();
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["mood", "name"]);
    }

    #[test]
    fn test_from_table_format_builds_instances() {
        let model = person_model();
        let mut row = HashMap::new();
        row.insert("id".to_string(), DataValue::Int(7));
        row.insert("name".to_string(), DataValue::from("x"));
        row.insert("unknown".to_string(), DataValue::from("ignored"));
        let instances = ModelInstance::from_table_format(&model, &[row]);
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].get("id"), Some(&DataValue::Int(7)));
        assert!(instances[0].get("unknown").is_none());
    }

    #[test]
    fn test_restore_enums() {
        let model = person_model();
        let mut rows = vec![HashMap::from([
            ("mood".to_string(), DataValue::from("sad")),
            ("name".to_string(), DataValue::from("x")),
        ])];
        restore_enums(&model, &mut rows, None).unwrap();
        match &rows[0]["mood"] {
            DataValue::Enum(member) => assert_eq!(member.key, "SAD"),
            other => panic!("unexpected {:?}", other),
        }

        let mut rows = vec![HashMap::from([("mood".to_string(), DataValue::from("angry"))])];
        assert!(restore_enums(&model, &mut rows, Some(&["mood"])).is_err());
        assert!(restore_enums(&model, &mut rows, Some(&["name"])).is_err());
    }
}
