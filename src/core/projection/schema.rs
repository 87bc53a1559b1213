// SPDX-License-Identifier: MIT OR Apache-2.0

//! Declarative shape of a projection's output table.

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::core::error::{LogFluxError, LogFluxResult};

/// Column holding the identity of the event a row derives from.
pub const EVENT_ID_FIELD: &str = "event_id";

/// Largest fixed-point scale: the decimal digits of an `i64`.
pub const MAX_SCALE: u32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Text,
    Int,
    Real,
    Bool,
}

impl ScalarType {
    pub const fn sql_type(&self) -> &'static str {
        match self {
            ScalarType::Text => "TEXT",
            ScalarType::Int | ScalarType::Bool => "INTEGER",
            ScalarType::Real => "REAL",
        }
    }

    pub const fn is_numeric(&self) -> bool {
        matches!(self, ScalarType::Int | ScalarType::Real)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    #[default]
    Field,
    StartOffset,
    FinishOffset,
    Duration,
    Metadata,
}

impl ColumnRole {
    /// Roles filled in by the host from the event itself.
    const fn is_timing(&self) -> bool {
        matches!(
            self,
            ColumnRole::StartOffset | ColumnRole::FinishOffset | ColumnRole::Duration
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionField {
    pub name: String,
    pub scalar_type: ScalarType,
    /// `false` for hidden metadata columns: queryable, never displayed.
    pub available: bool,
    /// Display toggle for available columns.
    pub visible: bool,
    /// Fixed-point scale: stored value is `display * 10^scale`.
    pub scale: Option<u32>,
    pub role: ColumnRole,
}

impl ProjectionField {
    pub fn new(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar_type,
            available: true,
            visible: true,
            scale: None,
            role: ColumnRole::Field,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ScalarType::Text)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, ScalarType::Int)
    }

    pub fn real(name: impl Into<String>) -> Self {
        Self::new(name, ScalarType::Real)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ScalarType::Bool)
    }

    /// Hidden metadata column.
    pub fn metadata(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self {
            available: false,
            visible: false,
            role: ColumnRole::Metadata,
            ..Self::new(name, scalar_type)
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn with_role(mut self, role: ColumnRole) -> Self {
        self.role = role;
        self
    }

    /// Whether the display layer shows this column.
    pub fn is_shown(&self) -> bool {
        self.available && self.visible
    }
}

/// Ordered field list of one projection, shared by writer and readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionSchema {
    fields: Vec<ProjectionField>,
    hierarchical: bool,
}

impl Default for ProjectionSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectionSchema {
    /// Schema holding only the hidden `event_id` column.
    pub fn new() -> Self {
        Self {
            fields: vec![ProjectionField::metadata(EVENT_ID_FIELD, ScalarType::Int)],
            hierarchical: false,
        }
    }

    /// Display schema with the conventional timing columns.
    pub fn display() -> Self {
        let mut schema = Self::new();
        schema.fields.extend([
            ProjectionField::int("start")
                .with_role(ColumnRole::StartOffset)
                .with_scale(9),
            ProjectionField::int("finish")
                .with_role(ColumnRole::FinishOffset)
                .with_scale(9)
                .hidden(),
            ProjectionField::int("duration")
                .with_role(ColumnRole::Duration)
                .with_scale(9),
        ]);
        schema
    }

    pub fn with_hierarchy(mut self, enabled: bool) -> Self {
        self.hierarchical = enabled;
        self
    }

    pub fn is_hierarchical(&self) -> bool {
        self.hierarchical
    }

    /// Append a field, rejecting names or roles the table cannot hold.
    pub fn add_field(&mut self, field: ProjectionField) -> LogFluxResult<&mut Self> {
        validate_name(&field.name)?;
        if self.index_of(&field.name).is_some() {
            return Err(LogFluxError::schema_invalid(
                format!("duplicate field '{}'", field.name),
                &field.name,
            ));
        }
        if field.role.is_timing() {
            if field.scalar_type != ScalarType::Int {
                return Err(LogFluxError::schema_invalid(
                    "timing columns must be int",
                    &field.name,
                ));
            }
            if self.role_index(field.role).is_some() {
                return Err(LogFluxError::schema_invalid(
                    format!("schema already has a {:?} column", field.role),
                    &field.name,
                ));
            }
        }
        if field.scale.is_some() && !field.scalar_type.is_numeric() {
            return Err(LogFluxError::schema_invalid(
                "scale applies only to numeric fields",
                &field.name,
            ));
        }
        check_scale(&field)?;
        self.fields.push(field);
        Ok(self)
    }

    /// Builder form of [`add_field`](Self::add_field).
    pub fn field(mut self, field: ProjectionField) -> LogFluxResult<Self> {
        self.add_field(field)?;
        Ok(self)
    }

    pub fn fields(&self) -> &[ProjectionField] {
        &self.fields
    }

    pub fn shown_fields(&self) -> impl Iterator<Item = (usize, &ProjectionField)> {
        self.fields.iter().enumerate().filter(|(_, f)| f.is_shown())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn role_index(&self, role: ColumnRole) -> Option<usize> {
        self.fields.iter().position(|f| f.role == role)
    }

    pub fn start_offset_column(&self) -> Option<usize> {
        self.role_index(ColumnRole::StartOffset)
    }

    pub fn finish_offset_column(&self) -> Option<usize> {
        self.role_index(ColumnRole::FinishOffset)
    }

    pub fn duration_column(&self) -> Option<usize> {
        self.role_index(ColumnRole::Duration)
    }

    pub fn set_visible(&mut self, name: &str, visible: bool) -> bool {
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) if field.available => {
                field.visible = visible;
                true
            }
            _ => false,
        }
    }

    pub fn create_table_sql(&self, table: &str) -> String {
        let columns: Vec<String> = self
            .fields
            .iter()
            .map(|f| format!("\"{}\" {}", f.name, f.scalar_type.sql_type()))
            .collect();
        format!("CREATE TABLE \"{}\" ({})", table, columns.join(", "))
    }

    /// Render a stored value of field `index` for display.
    pub fn format_value(&self, index: usize, value: &Value) -> String {
        let field = self.fields.get(index);
        match (value, field) {
            (Value::Null, _) => String::new(),
            (Value::Integer(v), Some(f)) if f.scalar_type == ScalarType::Bool => {
                (*v != 0).to_string()
            }
            (Value::Integer(v), Some(f)) => match f.scale {
                Some(scale) if scale > 0 => format_fixed(i128::from(*v), scale),
                _ => v.to_string(),
            },
            (Value::Real(v), Some(f)) => match f.scale {
                Some(scale) => format!("{:.*}", scale as usize, v / 10f64.powi(scale as i32)),
                None => v.to_string(),
            },
            (Value::Integer(v), None) => v.to_string(),
            (Value::Real(v), None) => v.to_string(),
            (Value::Text(s), _) => s.clone(),
            (Value::Blob(b), _) => format!("<{} bytes>", b.len()),
        }
    }

    pub fn to_json(&self) -> LogFluxResult<String> {
        serde_json::to_string(self).map_err(|e| LogFluxError::other(e.to_string()))
    }

    pub fn from_json(text: &str) -> LogFluxResult<Self> {
        let schema: ProjectionSchema = serde_json::from_str(text)
            .map_err(|e| LogFluxError::configuration(format!("Invalid schema JSON: {}", e)))?;
        if schema.index_of(EVENT_ID_FIELD).is_none() {
            return Err(LogFluxError::schema_invalid(
                "schema has no event_id column",
                EVENT_ID_FIELD,
            ));
        }
        for field in &schema.fields {
            check_scale(field)?;
        }
        Ok(schema)
    }
}

fn check_scale(field: &ProjectionField) -> LogFluxResult<()> {
    match field.scale {
        Some(scale) if scale > MAX_SCALE => Err(LogFluxError::schema_invalid(
            format!("scale {} exceeds the maximum of {}", scale, MAX_SCALE),
            &field.name,
        )),
        _ => Ok(()),
    }
}

fn format_fixed(raw: i128, scale: u32) -> String {
    let Some(divisor) = 10i128.checked_pow(scale) else {
        return raw.to_string();
    };
    let sign = if raw < 0 { "-" } else { "" };
    let abs = raw.abs();
    format!(
        "{}{}.{:0width$}",
        sign,
        abs / divisor,
        abs % divisor,
        width = scale as usize
    )
}

/// Field names become SQL identifiers: ASCII letters, digits and `_`, not
/// starting with a digit.
fn validate_name(name: &str) -> LogFluxResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(LogFluxError::schema_invalid(
            format!("'{}' is not a valid field name", name),
            name,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_schema_has_hidden_event_id() {
        let schema = ProjectionSchema::new();
        assert_eq!(schema.fields().len(), 1);
        let id = &schema.fields()[0];
        assert_eq!(id.name, EVENT_ID_FIELD);
        assert!(!id.available);
        assert!(!id.is_shown());
        assert_eq!(schema.shown_fields().count(), 0);
    }

    #[test]
    fn test_display_schema_roles() {
        let schema = ProjectionSchema::display();
        assert_eq!(schema.start_offset_column(), Some(1));
        assert_eq!(schema.finish_offset_column(), Some(2));
        assert_eq!(schema.duration_column(), Some(3));
        let shown: Vec<&str> = schema.shown_fields().map(|(_, f)| f.name.as_str()).collect();
        assert_eq!(shown, vec!["start", "duration"]);
    }

    #[test]
    fn test_duplicate_and_invalid_names_rejected() {
        let mut schema = ProjectionSchema::new();
        schema.add_field(ProjectionField::text("url")).unwrap();
        assert!(schema.add_field(ProjectionField::int("url")).is_err());
        assert!(schema.add_field(ProjectionField::int("event_id")).is_err());
        assert!(schema.add_field(ProjectionField::int("9lives")).is_err());
        assert!(schema.add_field(ProjectionField::int("a b")).is_err());
        assert!(schema.add_field(ProjectionField::int("")).is_err());
    }

    #[test]
    fn test_role_constraints() {
        let mut schema = ProjectionSchema::display();
        let err = schema
            .add_field(ProjectionField::int("again").with_role(ColumnRole::Duration))
            .unwrap_err();
        assert!(matches!(err, LogFluxError::SchemaInvalid { .. }));
        assert!(ProjectionSchema::new()
            .field(ProjectionField::real("start").with_role(ColumnRole::StartOffset))
            .is_err());
        assert!(ProjectionSchema::new()
            .field(ProjectionField::text("label").with_scale(2))
            .is_err());
    }

    #[test]
    fn test_create_table_sql() {
        let schema = ProjectionSchema::new()
            .field(ProjectionField::text("url"))
            .unwrap()
            .field(ProjectionField::boolean("ok"))
            .unwrap();
        assert_eq!(
            schema.create_table_sql("events"),
            "CREATE TABLE \"events\" (\"event_id\" INTEGER, \"url\" TEXT, \"ok\" INTEGER)"
        );
    }

    #[test]
    fn test_format_fixed_point() {
        let schema = ProjectionSchema::new()
            .field(ProjectionField::int("ms").with_scale(3))
            .unwrap()
            .field(ProjectionField::boolean("ok"))
            .unwrap()
            .field(ProjectionField::real("ratio").with_scale(2))
            .unwrap();
        assert_eq!(schema.format_value(1, &Value::Integer(1_500)), "1.500");
        assert_eq!(schema.format_value(1, &Value::Integer(-25)), "-0.025");
        assert_eq!(schema.format_value(2, &Value::Integer(1)), "true");
        assert_eq!(schema.format_value(3, &Value::Real(1234.0)), "12.34");
        assert_eq!(schema.format_value(0, &Value::Null), "");
    }

    #[test]
    fn test_scale_is_bounded() {
        let mut schema = ProjectionSchema::new();
        schema.add_field(ProjectionField::int("nanos").with_scale(MAX_SCALE)).unwrap();
        let err = schema
            .add_field(ProjectionField::int("huge").with_scale(40))
            .unwrap_err();
        assert!(matches!(err, LogFluxError::SchemaInvalid { .. }));

        let stored = schema.to_json().unwrap().replace("\"scale\":18", "\"scale\":40");
        assert!(stored.contains("\"scale\":40"));
        assert!(ProjectionSchema::from_json(&stored).is_err());

        // A scale that slipped past validation still formats without overflow.
        let unchecked = ProjectionSchema {
            fields: vec![ProjectionField::int("huge").with_scale(40)],
            hierarchical: false,
        };
        assert_eq!(unchecked.format_value(0, &Value::Integer(5)), "5");
        assert_eq!(format_fixed(123, MAX_SCALE), "0.000000000000000123");
    }

    #[test]
    fn test_visibility_toggle_ignores_metadata() {
        let mut schema = ProjectionSchema::display();
        assert!(schema.set_visible("finish", true));
        assert_eq!(schema.shown_fields().count(), 3);
        assert!(!schema.set_visible(EVENT_ID_FIELD, true));
        assert!(!schema.set_visible("missing", true));
    }

    #[test]
    fn test_json_round_trip_requires_event_id() {
        let schema = ProjectionSchema::display();
        let json = schema.to_json().unwrap();
        assert_eq!(ProjectionSchema::from_json(&json).unwrap(), schema);
        assert!(ProjectionSchema::from_json(r#"{"fields":[],"hierarchical":false}"#).is_err());
    }
}
