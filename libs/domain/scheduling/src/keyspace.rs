// [libs/domain/scheduling/src/keyspace.rs]
/*!
 * =================================================================
 * APARATO: KEYSPACE CALCULATOR
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L1)
 * RESPONSABILIDAD: CÁLCULO DE KEYSPACE BASE Y EFECTIVO POR MODO DE ATAQUE
 *
 * # Invariante (Pureza):
 * El calculador es una función pura de sus entradas. Toda estimación
 * emitida lleva is_accurate = false hasta la confirmación del primer
 * benchmark contra el motor real.
 * =================================================================
 */

use crate::errors::KeyspaceError;
use krakenhashes_domain_models::AttackMode;

/// Cardinalidades de las clases de caracteres integradas del motor.
const CHARSET_LOWER: u64 = 26; // ?l
const CHARSET_UPPER: u64 = 26; // ?u
const CHARSET_DIGIT: u64 = 10; // ?d
const CHARSET_SPECIAL: u64 = 33; // ?s
const CHARSET_ALL: u64 = 95; // ?a
const CHARSET_BYTE: u64 = 256; // ?b
const CHARSET_HEX_LOWER: u64 = 16; // ?h
const CHARSET_HEX_UPPER: u64 = 16; // ?H

/// Entradas ya resueltas para el cálculo (magnitudes, no ficheros).
#[derive(Debug, Clone)]
pub struct KeyspaceInputs<'a> {
    pub attack_mode: AttackMode,
    /// Líneas por wordlist, en el orden configurado del trabajo.
    pub wordlist_line_counts: &'a [u64],
    /// Líneas por fichero de reglas.
    pub rule_line_counts: &'a [u64],
    pub mask: Option<&'a str>,
    /// Charsets personalizados ?1..?4.
    pub custom_charsets: &'a [String],
    pub increment_mode: bool,
    pub increment_min: Option<u32>,
    pub increment_max: Option<u32>,
    /// Cardinalidad del hashlist (modo Association).
    pub hash_count: u64,
}

/// Plan de una capa incremental individual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerPlan {
    pub layer_index: u32,
    pub mask: String,
    pub base_keyspace: u64,
    pub effective_keyspace_estimate: u64,
}

/// Resultado del calculador: keyspace base, factor de reglas y capas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyspacePlan {
    pub base_keyspace: u64,
    pub multiplication_factor: u64,
    /// base × factor; para trabajos incrementales, Σ capas.
    pub effective_keyspace_estimate: u64,
    pub layers: Vec<LayerPlan>,
}

impl<'a> KeyspaceInputs<'a> {
    /// Computa el plan de keyspace completo del trabajo.
    ///
    /// # Errors:
    /// Propaga violaciones de aridad de wordlists, tokens de máscara
    /// desconocidos y desbordes del producto de cardinalidades.
    pub fn compute(&self) -> Result<KeyspacePlan, KeyspaceError> {
        let multiplication_factor = rule_multiplication_factor(self.rule_line_counts);

        // Modo incremental: una capa por longitud de prefijo de máscara.
        if self.attack_mode == AttackMode::BruteForce && self.increment_mode {
            return self.compute_layered_plan(multiplication_factor);
        }

        let base_keyspace = match self.attack_mode {
            AttackMode::Straight => self.total_wordlist_lines(),
            AttackMode::Combination => {
                if self.wordlist_line_counts.len() != 2 {
                    return Err(KeyspaceError::WordlistArity {
                        expected: 2,
                        actual: self.wordlist_line_counts.len(),
                    });
                }
                self.wordlist_line_counts[0]
                    .checked_mul(self.wordlist_line_counts[1])
                    .ok_or(KeyspaceError::Overflow)?
            }
            AttackMode::BruteForce => mask_combinations(self.required_mask()?, self.custom_charsets)?,
            AttackMode::HybridWordlistMask | AttackMode::HybridMaskWordlist => {
                let mask_product = mask_combinations(self.required_mask()?, self.custom_charsets)?;
                self.total_wordlist_lines()
                    .checked_mul(mask_product)
                    .ok_or(KeyspaceError::Overflow)?
            }
            AttackMode::Association => self.hash_count,
        };

        let effective_estimate = base_keyspace
            .checked_mul(multiplication_factor)
            .ok_or(KeyspaceError::Overflow)?;

        Ok(KeyspacePlan {
            base_keyspace,
            multiplication_factor,
            effective_keyspace_estimate: effective_estimate,
            layers: Vec::new(),
        })
    }

    /// Emite una capa por longitud de prefijo en [increment_min, increment_max].
    fn compute_layered_plan(&self, multiplication_factor: u64) -> Result<KeyspacePlan, KeyspaceError> {
        let mask = self.required_mask()?;
        let cardinalities = mask_token_cardinalities(mask, self.custom_charsets)?;
        let tokens = mask_tokens(mask)?;

        let minimum = self.increment_min.unwrap_or(1).max(1);
        let maximum = self.increment_max.unwrap_or(cardinalities.len() as u32);

        if minimum > maximum {
            return Err(KeyspaceError::IncrementBoundsInverted);
        }
        if maximum as usize > cardinalities.len() {
            return Err(KeyspaceError::IncrementOutOfRange {
                mask_tokens: cardinalities.len(),
                requested: maximum,
            });
        }

        let mut layers = Vec::with_capacity((maximum - minimum + 1) as usize);
        let mut job_total: u64 = 0;

        for (layer_index, prefix_length) in (minimum..=maximum).enumerate() {
            let layer_base: u64 = cardinalities[..prefix_length as usize]
                .iter()
                .try_fold(1u64, |product, cardinality| product.checked_mul(*cardinality))
                .ok_or(KeyspaceError::Overflow)?;

            let layer_effective = layer_base
                .checked_mul(multiplication_factor)
                .ok_or(KeyspaceError::Overflow)?;

            job_total = job_total
                .checked_add(layer_effective)
                .ok_or(KeyspaceError::Overflow)?;

            layers.push(LayerPlan {
                layer_index: layer_index as u32,
                mask: tokens[..prefix_length as usize].concat(),
                base_keyspace: layer_base,
                effective_keyspace_estimate: layer_effective,
            });
        }

        // El base del trabajo incremental es la suma de bases de capa; el
        // despacho siempre ocurre por capa, nunca sobre este agregado.
        let aggregate_base = layers
            .iter()
            .try_fold(0u64, |sum, layer| sum.checked_add(layer.base_keyspace))
            .ok_or(KeyspaceError::Overflow)?;

        Ok(KeyspacePlan {
            base_keyspace: aggregate_base,
            multiplication_factor,
            effective_keyspace_estimate: job_total,
            layers,
        })
    }

    fn total_wordlist_lines(&self) -> u64 {
        self.wordlist_line_counts.iter().copied().sum()
    }

    fn required_mask(&self) -> Result<&'a str, KeyspaceError> {
        self.mask
            .filter(|candidate| !candidate.is_empty())
            .ok_or(KeyspaceError::MaskRequired(attack_mode_label(self.attack_mode)))
    }
}

/// Producto de líneas de los ficheros de reglas (1 sin reglas).
pub fn rule_multiplication_factor(rule_line_counts: &[u64]) -> u64 {
    rule_line_counts
        .iter()
        .copied()
        .filter(|count| *count > 0)
        .product::<u64>()
        .max(1)
}

/// Combinaciones totales de una máscara completa.
pub fn mask_combinations(mask: &str, custom_charsets: &[String]) -> Result<u64, KeyspaceError> {
    mask_token_cardinalities(mask, custom_charsets)?
        .into_iter()
        .try_fold(1u64, |product, cardinality| product.checked_mul(cardinality))
        .ok_or(KeyspaceError::Overflow)
}

/// Descompone la máscara en tokens ('?d', '?1', literales) preservando texto.
pub fn mask_tokens(mask: &str) -> Result<Vec<String>, KeyspaceError> {
    let mut tokens = Vec::new();
    let mut characters = mask.chars();

    while let Some(current) = characters.next() {
        if current == '?' {
            let class = characters.next().ok_or(KeyspaceError::DanglingMaskToken)?;
            tokens.push(format!("?{}", class));
        } else {
            tokens.push(current.to_string());
        }
    }

    if tokens.is_empty() {
        return Err(KeyspaceError::EmptyMask);
    }
    Ok(tokens)
}

/// Cardinalidad por posición de la máscara. '??' es el literal '?';
/// todo carácter fuera de un token cuenta como literal de cardinalidad 1.
pub fn mask_token_cardinalities(
    mask: &str,
    custom_charsets: &[String],
) -> Result<Vec<u64>, KeyspaceError> {
    let mut cardinalities = Vec::new();

    for token in mask_tokens(mask)? {
        if let Some(class) = token.strip_prefix('?').and_then(|rest| rest.chars().next()) {
            let cardinality = match class {
                'l' => CHARSET_LOWER,
                'u' => CHARSET_UPPER,
                'd' => CHARSET_DIGIT,
                's' => CHARSET_SPECIAL,
                'a' => CHARSET_ALL,
                'b' => CHARSET_BYTE,
                'h' => CHARSET_HEX_LOWER,
                'H' => CHARSET_HEX_UPPER,
                '?' => 1,
                digit @ '1'..='4' => {
                    let slot = digit as usize - '1' as usize;
                    let charset = custom_charsets
                        .get(slot)
                        .filter(|charset| !charset.is_empty())
                        .ok_or(KeyspaceError::MissingCustomCharset(digit as u8 - b'0'))?;
                    charset.chars().count() as u64
                }
                unknown => return Err(KeyspaceError::UnknownMaskToken(unknown)),
            };
            cardinalities.push(cardinality);
        } else {
            cardinalities.push(1);
        }
    }

    Ok(cardinalities)
}

fn attack_mode_label(mode: AttackMode) -> &'static str {
    match mode {
        AttackMode::Straight => "straight",
        AttackMode::Combination => "combination",
        AttackMode::BruteForce => "brute_force",
        AttackMode::HybridWordlistMask => "hybrid_wordlist_mask",
        AttackMode::HybridMaskWordlist => "hybrid_mask_wordlist",
        AttackMode::Association => "association",
    }
}
