//! 模型定义与SQL渲染
//!
//! 模型通过 [`ModelBuilder`] 按顺序声明字段或枚举成员，构建时一次性完成全部检查，
//! 得到不可变的 [`ModelDefinition`]

use crate::error::DualDbResult;
use crate::model::enum_types::EnumDefinition;
use crate::model::field_types::FieldDefinition;
use crate::model::meta::{InitType, ModelMeta};
use crate::security::DatabaseSecurityValidator;
use crate::types::{DataValue, DatabaseType};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 条件初始化钩子，参数为 (模式名, 表名)，返回内联到初始化块中的SQL
pub type InitHook = Arc<dyn Fn(&str, &str) -> String + Send + Sync>;

/// 模型中的名字最终都会拼进语句文本，按语句构建时的同一规则检查
fn check_identifier(model: &str, kind: &str, name: &str) -> DualDbResult<()> {
    DatabaseSecurityValidator::new(DatabaseType::PostgreSQL)
        .validate_field_name(name)
        .map_err(|_| {
            crate::dual_error!(
                definition,
                model,
                format!("invalid {} name '{}'", kind, name)
            )
        })
}

/// 模型构建器
pub struct ModelBuilder {
    name: String,
    meta: ModelMeta,
    fields: Vec<(String, FieldDefinition)>,
    enum_members: Vec<(String, String)>,
    on_create: Option<InitHook>,
    on_exists: Option<InitHook>,
}

impl ModelBuilder {
    /// 创建模型构建器
    pub fn new(name: &str, meta: ModelMeta) -> Self {
        Self {
            name: name.to_string(),
            meta,
            fields: Vec::new(),
            enum_members: Vec::new(),
            on_create: None,
            on_exists: None,
        }
    }

    /// 声明字段（按声明顺序成为列顺序）
    pub fn field(mut self, name: &str, definition: FieldDefinition) -> Self {
        self.fields.push((name.to_string(), definition));
        self
    }

    /// 声明枚举成员
    pub fn enum_value(mut self, key: &str, value: &str) -> Self {
        self.enum_members.push((key.to_string(), value.to_string()));
        self
    }

    /// 表不存在时执行的钩子
    pub fn on_create<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &str) -> String + Send + Sync + 'static,
    {
        self.on_create = Some(Arc::new(hook));
        self
    }

    /// 表已存在时执行的钩子
    pub fn on_exists<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &str) -> String + Send + Sync + 'static,
    {
        self.on_exists = Some(Arc::new(hook));
        self
    }

    /// 检查并构建模型定义
    pub fn build(self) -> DualDbResult<Arc<ModelDefinition>> {
        let name = self.name;
        let init_type = self.meta.inspect(&name)?;

        for schema in self.meta.schema_name.iter().flatten() {
            check_identifier(&name, "schema", schema)?;
        }

        let mut fields: Vec<(String, FieldDefinition)> = Vec::with_capacity(self.fields.len());
        let mut enum_def = None;

        match init_type {
            InitType::Table => {
                let table = self.meta.table_name.iter().flatten().next();
                if let Some(table) = table {
                    check_identifier(&name, "table", table)?;
                }
                if !self.enum_members.is_empty() {
                    return Err(crate::dual_error!(
                        definition,
                        name,
                        "enum values can only be declared on an enum model"
                    ));
                }
                if self.fields.is_empty() {
                    return Err(crate::dual_error!(definition, name, "table has no field"));
                }
                for (column, field) in self.fields {
                    check_identifier(&name, "column", &column)?;
                    if fields.iter().any(|(existing, _)| *existing == column) {
                        return Err(crate::dual_error!(
                            definition,
                            name,
                            format!("duplicate field {}", column)
                        ));
                    }
                    let field = field.resolve(&name, &column)?;
                    fields.push((column, field));
                }
                if self.meta.conditional_init {
                    let mut lack = Vec::new();
                    if self.on_create.is_none() {
                        lack.push("on_create");
                    }
                    if self.on_exists.is_none() {
                        lack.push("on_exists");
                    }
                    if !lack.is_empty() {
                        return Err(crate::dual_error!(
                            definition,
                            name,
                            format!("lack of conditional init hook: {}", lack.join(", "))
                        ));
                    }
                }
            }
            InitType::Enum => {
                if !self.fields.is_empty() {
                    return Err(crate::dual_error!(
                        definition,
                        name,
                        "fields can only be declared on a table model"
                    ));
                }
                if self.enum_members.is_empty() {
                    return Err(crate::dual_error!(definition, name, "enum has no value"));
                }
                let enum_name = self.meta.enum_name.iter().flatten().next().cloned().unwrap_or_default();
                check_identifier(&name, "enum", &enum_name)?;
                for (key, _) in &self.enum_members {
                    check_identifier(&name, "enum key", key)?;
                }
                let schema = self.meta.schema_name.iter().flatten().next().cloned().unwrap_or_default();
                enum_def = Some(Arc::new(EnumDefinition::build(
                    &name,
                    &enum_name,
                    &schema,
                    &self.enum_members,
                )?));
            }
            InitType::Schema => {
                if !self.fields.is_empty() || !self.enum_members.is_empty() {
                    return Err(crate::dual_error!(
                        definition,
                        name,
                        "schema model cannot declare fields or enum values"
                    ));
                }
            }
        }

        Ok(Arc::new(ModelDefinition {
            name,
            init_type,
            meta: self.meta,
            fields,
            enum_def,
            on_create: self.on_create,
            on_exists: self.on_exists,
        }))
    }
}

/// 不可变的模型定义
pub struct ModelDefinition {
    name: String,
    init_type: InitType,
    meta: ModelMeta,
    fields: Vec<(String, FieldDefinition)>,
    enum_def: Option<Arc<EnumDefinition>>,
    on_create: Option<InitHook>,
    on_exists: Option<InitHook>,
}

impl fmt::Debug for ModelDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDefinition")
            .field("name", &self.name)
            .field("init_type", &self.init_type)
            .field("meta", &self.meta)
            .field("fields", &self.fields)
            .field("enum_def", &self.enum_def)
            .field("on_create", &self.on_create.is_some())
            .field("on_exists", &self.on_exists.is_some())
            .finish()
    }
}

impl ModelDefinition {
    /// 模型名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 初始化类型
    pub fn init_type(&self) -> InitType {
        self.init_type
    }

    /// 元数据
    pub fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    /// 模式名列表
    pub fn schema_names(&self) -> &[String] {
        self.meta.schema_name.as_deref().unwrap_or_default()
    }

    /// 表名（仅数据表模型）
    pub fn table_name(&self) -> Option<&str> {
        match self.init_type {
            InitType::Table => self
                .meta
                .table_name
                .as_ref()
                .and_then(|names| names.first())
                .map(String::as_str),
            _ => None,
        }
    }

    /// 枚举定义（仅枚举模型）
    pub fn enum_definition(&self) -> Option<&Arc<EnumDefinition>> {
        self.enum_def.as_ref()
    }

    /// 按名称获取字段
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, field)| field)
    }

    /// 全部字段（声明顺序）
    pub fn fields(&self) -> &[(String, FieldDefinition)] {
        &self.fields
    }

    /// 列名列表
    pub fn headers(&self) -> Vec<String> {
        self.fields.iter().map(|(column, _)| column.clone()).collect()
    }

    /// 必填列名列表（自增列由数据库生成，不计入）
    pub fn required_headers(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, field)| field.required && !field.auto_increment)
            .map(|(column, _)| column.clone())
            .collect()
    }

    /// 列名 -> 类型文本
    pub fn headers_type(&self) -> HashMap<String, String> {
        self.fields
            .iter()
            .map(|(column, field)| (column.clone(), field.render_type()))
            .collect()
    }

    /// 列名 -> 默认值，自增主键不包含在内
    pub fn headers_default(&self) -> HashMap<String, DataValue> {
        self.fields
            .iter()
            .filter(|(_, field)| !field.is_serial_primary_key())
            .map(|(column, field)| (column.clone(), field.default_data_value()))
            .collect()
    }

    /// 列名 -> 索引方法，仅包含声明了索引方法的列
    pub fn index_methods(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .filter_map(|(column, field)| {
                field
                    .index_method
                    .as_deref()
                    .filter(|method| !method.is_empty())
                    .map(|method| (column.clone(), method.to_uppercase()))
            })
            .collect()
    }

    /// 逗号连接的列定义子句
    pub fn field_conditions(&self) -> String {
        self.fields
            .iter()
            .map(|(column, field)| format!("{} {}", column, field.render()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// 引用枚举的列
    pub fn enum_columns(&self) -> Vec<(String, Arc<EnumDefinition>)> {
        self.fields
            .iter()
            .filter_map(|(column, field)| {
                field
                    .enum_ref
                    .as_ref()
                    .map(|definition| (column.clone(), Arc::clone(definition)))
            })
            .collect()
    }

    fn expect_init_type(&self, expected: InitType) -> DualDbResult<()> {
        if self.init_type == expected {
            Ok(())
        } else {
            Err(crate::dual_error!(
                definition,
                self.name,
                format!("invalid init_type ( {} )", self.init_type.as_str())
            ))
        }
    }

    fn table(&self) -> DualDbResult<&str> {
        self.table_name()
            .ok_or_else(|| crate::dual_error!(definition, self.name, "table_name should not be empty"))
    }

    /// 渲染 `CREATE SCHEMA`，参数中的所有者优先于元数据
    pub fn form_schema_sql(&self, authorization: Option<&str>) -> DualDbResult<String> {
        self.expect_init_type(InitType::Schema)?;
        let authorization = authorization
            .or(self.meta.authorization.as_deref())
            .ok_or_else(|| crate::dual_error!(definition, self.name, "lack of meta: authorization"))?;
        check_identifier(&self.name, "authorization", authorization)?;
        let schema = self.schema_names().first().map(String::as_str).unwrap_or_default();
        Ok(format!(
            "CREATE SCHEMA IF NOT EXISTS {} AUTHORIZATION {};",
            schema, authorization
        ))
    }

    /// 渲染 `CREATE TABLE`，每个模式一条
    pub fn form_table_sql(&self) -> DualDbResult<String> {
        self.expect_init_type(InitType::Table)?;
        let table = self.table()?;
        let conditions = self.field_conditions();
        Ok(self
            .schema_names()
            .iter()
            .map(|schema| format!("CREATE TABLE IF NOT EXISTS {}.{} ( {} );", schema, table, conditions))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// 渲染带存在性检查的建表块，每个模式一块
    pub fn form_table_conditional_sql(&self) -> DualDbResult<String> {
        self.expect_init_type(InitType::Table)?;
        let table = self.table()?;
        let (Some(on_create), Some(on_exists)) = (&self.on_create, &self.on_exists) else {
            return Err(crate::dual_error!(
                definition,
                self.name,
                "lack of conditional init hook: on_create, on_exists"
            ));
        };
        let conditions = self.field_conditions();

        let blocks = self
            .schema_names()
            .iter()
            .map(|schema| {
                let create_sql = on_create(schema, table);
                let exists_sql = on_exists(schema, table);
                let mut block = String::new();
                block.push_str("DO $$\nBEGIN\n");
                block.push_str(&format!(
                    "IF NOT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_schema = '{}' AND table_name = '{}') THEN\n",
                    schema, table
                ));
                block.push_str(&format!("    CREATE TABLE {}.{} ( {} );\n", schema, table, conditions));
                if !create_sql.trim().is_empty() {
                    block.push_str(&format!("    {}\n", create_sql.trim()));
                }
                if !exists_sql.trim().is_empty() {
                    block.push_str(&format!("ELSE\n    {}\n", exists_sql.trim()));
                }
                block.push_str("END IF;\nEND$$;");
                block
            })
            .collect::<Vec<_>>();
        Ok(blocks.join("\n"))
    }

    /// 渲染 `CREATE INDEX`，每个模式每个索引列一条
    pub fn form_index_sql(&self) -> DualDbResult<String> {
        self.expect_init_type(InitType::Table)?;
        let table = self.table()?;
        let index_methods = self.index_methods();
        let mut statements = Vec::new();
        for schema in self.schema_names() {
            for (column, method) in &index_methods {
                statements.push(format!(
                    "CREATE INDEX IF NOT EXISTS {}{} ON {}.{} USING {} ({});",
                    self.meta.index_prefix, column, schema, table, method, column
                ));
            }
        }
        Ok(statements.join("\n"))
    }

    /// 渲染 `CREATE TYPE ... AS ENUM`，每个模式一块，按系统目录检查是否已存在
    pub fn form_enum_sql(&self) -> DualDbResult<String> {
        self.expect_init_type(InitType::Enum)?;
        let definition = self
            .enum_def
            .as_ref()
            .ok_or_else(|| crate::dual_error!(definition, self.name, "enum has no value"))?;
        let literals = definition.sql_literals();

        let blocks = self
            .schema_names()
            .iter()
            .map(|schema| {
                format!(
                    "DO $$\nBEGIN\nIF NOT EXISTS (SELECT 1 FROM pg_type t JOIN pg_namespace n ON n.oid = t.typnamespace WHERE t.typname = '{name}' AND n.nspname = '{schema}') THEN\n    CREATE TYPE {schema}.{name} AS ENUM ({literals});\nEND IF;\nEND$$;",
                    name = definition.name(),
                    schema = schema,
                    literals = literals
                )
            })
            .collect::<Vec<_>>();
        Ok(blocks.join("\n"))
    }
}
