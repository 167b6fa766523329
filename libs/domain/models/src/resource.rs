// [libs/domain/models/src/resource.rs]
//! =================================================================
//! APARATO: RESOURCE CATALOG MODELS
//! CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
//! RESPONSABILIDAD: DESCRIPTORES DE WORDLISTS, REGLAS Y BINARIOS
//! =================================================================

use serde::{Deserialize, Serialize};

/// Familia de recurso de disco consumida por los agentes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Wordlist,
    Rule,
    Binary,
}

impl ResourceKind {
    /// Subdirectorio del data root compartido donde vive el recurso.
    pub fn root_subdirectory(&self) -> &'static str {
        match self {
            ResourceKind::Wordlist => "wordlists",
            ResourceKind::Rule => "rules",
            ResourceKind::Binary => "binaries",
        }
    }
}

/// Metadatos resueltos de un recurso (id -> fichero + magnitudes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub id: i64,
    pub kind: ResourceKind,
    pub filename: String,
    /// Ruta relativa al data root compartido, tal como la consumen los agentes.
    pub relative_path: String,
    /// Líneas del fichero (palabras o reglas); 0 para binarios.
    pub line_count: u64,
    pub file_size: u64,
    pub md5: Option<String>,
    /// Etiqueta de versión (solo binarios).
    pub version_label: Option<String>,
}
