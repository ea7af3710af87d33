use serde::{Deserialize, Serialize};
use tree_sitter::Node;

/// Byte and line range of one declaration in its source buffer. Lines are
/// 1-based and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start_offset: usize,
    pub end_offset: usize,
    pub start_line: usize,
    pub end_line: usize,
}

impl Span {
    pub fn of(node: Node) -> Self {
        let start = node.start_position();
        let end = node.end_position();
        // A node ending right after a newline ends on the previous line.
        let end_line = if end.column == 0 && end.row > start.row {
            end.row
        } else {
            end.row + 1
        };
        Self {
            start_offset: node.start_byte(),
            end_offset: node.end_byte(),
            start_line: start.row + 1,
            end_line,
        }
    }

    pub fn is_within(&self, len: usize) -> bool {
        self.start_offset <= self.end_offset && self.end_offset <= len
    }

    pub fn slice<'s>(&self, source: &'s [u8]) -> Option<&'s [u8]> {
        source.get(self.start_offset..self.end_offset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Function,
    Method,
    TypeDeclaration,
    ValueDeclaration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKeyword {
    Type,
    Var,
    Const,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeCategory {
    Struct,
    Interface,
    AliasOrBasic,
}

impl TypeCategory {
    /// Category of a type spec from the kind of its underlying type node.
    pub fn from_type_kind(kind: &str) -> Self {
        match kind {
            "struct_type" => Self::Struct,
            "interface_type" => Self::Interface,
            _ => Self::AliasOrBasic,
        }
    }
}

/// Kind-specific facts about a located declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationDetail {
    Function {
        name: String,
        receiver_type: Option<String>,
        signature: String,
    },
    Type {
        name: String,
        category: TypeCategory,
        definition: String,
    },
    Value {
        keyword: DeclarationKeyword,
        names: Vec<String>,
        declared_type: Option<String>,
        inferred_type: Option<String>,
    },
}

impl DeclarationDetail {
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            Self::Function {
                receiver_type: Some(_),
                ..
            } => EntityKind::Method,
            Self::Function { .. } => EntityKind::Function,
            Self::Type { .. } => EntityKind::TypeDeclaration,
            Self::Value { .. } => EntityKind::ValueDeclaration,
        }
    }

    /// `Name`, `Recv.Name` for methods, or the comma-joined names of a
    /// value spec.
    pub fn entity_name(&self) -> String {
        match self {
            Self::Function {
                name,
                receiver_type: Some(receiver),
                ..
            } => format!("{receiver}.{name}"),
            Self::Function { name, .. } | Self::Type { name, .. } => name.clone(),
            Self::Value { names, .. } => names.join(", "),
        }
    }
}

/// Flat metadata of a chunk. Field order is the serialized key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub file_path: String,
    pub package_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_path: Option<String>,
    pub entity_type: EntityKind,
    pub entity_name: String,
    pub start_line: usize,
    pub end_line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declaration_kind: Option<DeclarationKeyword>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_category: Option<TypeCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inferred_type: Option<String>,
}

impl ChunkMetadata {
    pub fn new(
        file_path: impl Into<String>,
        package_name: impl Into<String>,
        package_path: Option<String>,
        span: Span,
        detail: &DeclarationDetail,
    ) -> Self {
        let mut metadata = Self {
            file_path: file_path.into(),
            package_name: package_name.into(),
            package_path,
            entity_type: detail.entity_kind(),
            entity_name: detail.entity_name(),
            start_line: span.start_line,
            end_line: span.end_line,
            signature: None,
            receiver_type: None,
            declaration_kind: None,
            type_category: None,
            type_definition: None,
            declared_type: None,
            inferred_type: None,
        };
        match detail {
            DeclarationDetail::Function {
                receiver_type,
                signature,
                ..
            } => {
                metadata.signature = Some(signature.clone());
                metadata.receiver_type = receiver_type.clone();
            }
            DeclarationDetail::Type {
                category,
                definition,
                ..
            } => {
                metadata.declaration_kind = Some(DeclarationKeyword::Type);
                metadata.type_category = Some(*category);
                metadata.type_definition = Some(definition.clone());
            }
            DeclarationDetail::Value {
                keyword,
                declared_type,
                inferred_type,
                ..
            } => {
                metadata.declaration_kind = Some(*keyword);
                metadata.declared_type = declared_type.clone();
                metadata.inferred_type = inferred_type.clone();
            }
        }
        metadata
    }
}

/// The retrievable unit: canonicalized declaration text plus metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub document: String,
    pub metadata: ChunkMetadata,
}

impl ChunkRecord {
    pub fn new(document: String, metadata: ChunkMetadata) -> Self {
        let id = format!(
            "{}:{}-{}-{}",
            metadata.file_path, metadata.start_line, metadata.end_line, metadata.entity_name
        );
        Self {
            id,
            document,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span {
            start_offset: 14,
            end_offset: 60,
            start_line: 3,
            end_line: 5,
        }
    }

    #[test]
    fn test_span_bounds() {
        let span = span();
        assert!(span.is_within(60));
        assert!(!span.is_within(59));
        assert_eq!(span.slice(&[0u8; 59]), None);
        assert_eq!(span.slice(&[7u8; 60]).map(<[u8]>::len), Some(46));

        let inverted = Span {
            start_offset: 10,
            end_offset: 4,
            ..span
        };
        assert!(!inverted.is_within(100));
    }

    #[test]
    fn test_method_naming() {
        let method = DeclarationDetail::Function {
            name: "Close".to_string(),
            receiver_type: Some("*Conn".to_string()),
            signature: "() error".to_string(),
        };
        assert_eq!(method.entity_kind(), EntityKind::Method);
        assert_eq!(method.entity_name(), "*Conn.Close");

        let value = DeclarationDetail::Value {
            keyword: DeclarationKeyword::Var,
            names: vec!["a".to_string(), "b".to_string()],
            declared_type: None,
            inferred_type: None,
        };
        assert_eq!(value.entity_name(), "a, b");
    }

    #[test]
    fn test_metadata_serialization_order_and_omission() {
        let detail = DeclarationDetail::Function {
            name: "Run".to_string(),
            receiver_type: None,
            signature: "(ctx context.Context) error".to_string(),
        };
        let metadata = ChunkMetadata::new("cmd/run.go", "main", None, span(), &detail);
        let record = ChunkRecord::new("func Run() {}".to_string(), metadata);

        assert_eq!(record.id, "cmd/run.go:3-5-Run");
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"id":"cmd/run.go:3-5-Run","document":"func Run() {}","metadata":{"file_path":"cmd/run.go","package_name":"main","entity_type":"function","entity_name":"Run","start_line":3,"end_line":5,"signature":"(ctx context.Context) error"}}"#
        );
    }

    #[test]
    fn test_type_metadata() {
        let detail = DeclarationDetail::Type {
            name: "Handler".to_string(),
            category: TypeCategory::from_type_kind("interface_type"),
            definition: "interface{Serve()}".to_string(),
        };
        let metadata = ChunkMetadata::new(
            "h.go",
            "web",
            Some("example.com/web".to_string()),
            span(),
            &detail,
        );
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["entity_type"], "type_declaration");
        assert_eq!(value["declaration_kind"], "type");
        assert_eq!(value["type_category"], "interface");
        assert_eq!(value["package_path"], "example.com/web");
        assert!(value.get("signature").is_none());
        assert_eq!(TypeCategory::from_type_kind("map_type"), TypeCategory::AliasOrBasic);
    }
}
