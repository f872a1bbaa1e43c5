//! 标识符安全验证工具
//!
//! 列名、表名和集合名会直接拼接进语句文本，拼接前必须通过这里的检查，
//! 防止SQL注入和NoSQL注入

use crate::error::{DualDbError, DualDbResult};
use crate::types::DatabaseType;
use once_cell::sync::Lazy;
use regex::Regex;

/// 标识符最大长度（PostgreSQL NAMEDATALEN - 1）
const MAX_IDENTIFIER_LEN: usize = 63;

/// 不允许作为标识符的SQL关键字
const SQL_RESERVED: [&str; 24] = [
    "SELECT", "FROM", "WHERE", "INSERT", "UPDATE", "DELETE", "CREATE", "DROP", "ALTER",
    "TABLE", "AND", "OR", "NOT", "NULL", "UNION", "JOIN", "GROUP", "HAVING", "ORDER",
    "LIMIT", "OFFSET", "GRANT", "REVOKE", "SCHEMA",
];

static SQL_IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// 数据库安全验证器
pub struct DatabaseSecurityValidator {
    db_type: DatabaseType,
}

impl DatabaseSecurityValidator {
    /// 创建新的安全验证器
    pub fn new(db_type: DatabaseType) -> Self {
        Self { db_type }
    }

    /// 验证字段名的安全性
    pub fn validate_field_name(&self, field_name: &str) -> DualDbResult<()> {
        match self.db_type {
            DatabaseType::PostgreSQL => validate_sql_identifier("field_name", field_name),
            DatabaseType::MongoDB => {
                if field_name.is_empty() || field_name.starts_with('$') || field_name.contains('\0') {
                    return Err(invalid("field_name", field_name, "字段名不能为空或以$开头"));
                }
                Ok(())
            }
        }
    }

    /// 验证表名的安全性
    ///
    /// PostgreSQL 表名允许一个 `schema.table` 形式的模式前缀
    pub fn validate_table_name(&self, table_name: &str) -> DualDbResult<()> {
        match self.db_type {
            DatabaseType::PostgreSQL => {
                let mut parts = table_name.split('.');
                let first = parts.next().unwrap_or_default();
                let second = parts.next();
                if parts.next().is_some() {
                    return Err(invalid("table_name", table_name, "表名最多包含一个模式前缀"));
                }
                validate_sql_identifier("table_name", first)?;
                if let Some(table) = second {
                    validate_sql_identifier("table_name", table)?;
                }
                Ok(())
            }
            DatabaseType::MongoDB => {
                if table_name.is_empty()
                    || table_name.starts_with('$')
                    || table_name.contains('\0')
                    || table_name.starts_with("system.")
                {
                    return Err(invalid("collection", table_name, "集合名非法"));
                }
                Ok(())
            }
        }
    }
}

fn invalid(field: &str, name: &str, reason: &str) -> DualDbError {
    DualDbError::ValidationError {
        field: field.to_string(),
        message: format!("{}: '{}'", reason, name),
    }
}

fn validate_sql_identifier(field: &str, name: &str) -> DualDbResult<()> {
    if name.is_empty() {
        return Err(invalid(field, name, "标识符不能为空"));
    }
    if !SQL_IDENTIFIER.is_match(name) {
        return Err(invalid(field, name, "标识符只能由字母、数字和下划线组成且不能以数字开头"));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(invalid(field, name, "标识符长度不能超过63个字符"));
    }
    if SQL_RESERVED.contains(&name.to_uppercase().as_str()) {
        return Err(invalid(field, name, "标识符不能使用SQL关键字"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_identifier_validation() {
        let validator = DatabaseSecurityValidator::new(DatabaseType::PostgreSQL);

        assert!(validator.validate_field_name("camera_ip").is_ok());
        assert!(validator.validate_table_name("public.lot_table").is_ok());

        assert!(validator.validate_field_name("").is_err());
        assert!(validator.validate_field_name("1roi").is_err());
        assert!(validator.validate_field_name("roi; DROP").is_err());
        assert!(validator.validate_field_name("select").is_err());
        assert!(validator.validate_table_name("a.b.c").is_err());
    }

    #[test]
    fn test_collection_validation() {
        let validator = DatabaseSecurityValidator::new(DatabaseType::MongoDB);
        assert!(validator.validate_table_name("vehicle-log").is_ok());
        assert!(validator.validate_table_name("$cmd").is_err());
        assert!(validator.validate_table_name("system.users").is_err());
        assert!(validator.validate_field_name("$where").is_err());
    }
}
