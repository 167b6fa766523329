// [libs/domain/scheduling/src/errors.rs]
//! =================================================================
//! APARATO: SCHEDULING ERROR CATALOG
//! CLASIFICACIÓN: DOMAIN CORE (ESTRATO L1)
//! RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE PLANIFICACIÓN
//! =================================================================

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum KeyspaceError {
    /// El modo de ataque exige una máscara y no se suministró.
    #[error("[L1_KEYSPACE_FAULT]: MASK_REQUIRED for attack mode {0}")]
    MaskRequired(&'static str),

    /// La máscara no contiene ningún token computable.
    #[error("[L1_KEYSPACE_FAULT]: EMPTY_MASK")]
    EmptyMask,

    /// Token '?x' desconocido dentro de la máscara.
    #[error("[L1_KEYSPACE_FAULT]: UNKNOWN_MASK_TOKEN -> ?{0}")]
    UnknownMaskToken(char),

    /// Token '?N' referencia un charset personalizado no suministrado.
    #[error("[L1_KEYSPACE_FAULT]: MISSING_CUSTOM_CHARSET -> ?{0}")]
    MissingCustomCharset(u8),

    /// La máscara termina en un '?' sin clase.
    #[error("[L1_KEYSPACE_FAULT]: DANGLING_MASK_TOKEN")]
    DanglingMaskToken,

    /// Cantidad de wordlists incompatible con el modo de ataque.
    #[error("[L1_KEYSPACE_FAULT]: WORDLIST_ARITY_VIOLATION (expected {expected}, got {actual})")]
    WordlistArity { expected: usize, actual: usize },

    /// Rango incremental fuera de la longitud de la máscara.
    #[error("[L1_KEYSPACE_FAULT]: INCREMENT_RANGE_OUT_OF_MASK (mask tokens {mask_tokens}, requested {requested})")]
    IncrementOutOfRange { mask_tokens: usize, requested: u32 },

    /// Límites incrementales invertidos (min > max).
    #[error("[L1_KEYSPACE_FAULT]: INCREMENT_BOUNDS_INVERTED")]
    IncrementBoundsInverted,

    /// El producto de cardinalidades desborda u64.
    #[error("[L1_KEYSPACE_FAULT]: KEYSPACE_OVERFLOW")]
    Overflow,
}
