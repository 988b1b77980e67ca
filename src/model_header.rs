//! Lectura y validación del descriptor binario del modelo.
//!
//! Formato (little-endian):
//!
//! ```text
//! 0   u32  magic0 (MODEL_HEADER_MAGIC0)
//! 4   u16  header_size: offset de la cabecera ML4F
//! 6   u16  samples_period (ms)
//! 8   u16  samples_length
//! 10  u8   sample_dimensions
//! 11  [u8; 8] reservado
//! 19  u8   number_of_actions
//! 20  acciones: f32 threshold, u8 label_length, label (terminada en NUL),
//!     relleno hasta múltiplo de 4
//! ```
//!
//! El descriptor nunca se copia: todo lo que se devuelve apunta a los bytes
//! originales.

use std::borrow::Cow;
use std::ffi::CStr;

use thiserror::Error;

use crate::byte_cursor::ByteCursor;
use crate::engine::EngineModel;

pub const MODEL_HEADER_MAGIC0: u32 = 0x4D4F_444C;

const HEADER_RESERVED_BYTES: usize = 8;
pub const ACTIONS_OFFSET: usize = 20;
const ACTION_ALIGNMENT: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Descriptor truncated: {needed} bytes needed at offset {offset}, only {len} available")]
    Truncated {
        offset: usize,
        needed: usize,
        len: usize,
    },

    #[error("Invalid {field}: expected 0x{expected:08X}, found 0x{found:08X}")]
    BadMagic {
        field: &'static str,
        expected: u32,
        found: u32,
    },

    #[error("Header field {0} must be non-zero")]
    ZeroField(&'static str),

    #[error("Label of action {index} at offset {offset} is not NUL terminated exactly once")]
    CorruptLabel { index: usize, offset: usize },

    #[error("{field} exceeds the maximum of {max}")]
    TooLarge { field: &'static str, max: usize },
}

/// Acción del modelo: etiqueta prestada del descriptor y su umbral
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Action<'a> {
    pub label: &'a CStr,
    pub threshold: f32,
}

impl<'a> Action<'a> {
    /// Etiqueta como texto; los bytes que no sean UTF-8 se reemplazan
    pub fn name(&self) -> Cow<'a, str> {
        self.label.to_string_lossy()
    }
}

/// Cabecera validada del descriptor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelHeader<'a> {
    bytes: &'a [u8],
    header_size: u16,
    samples_period: u16,
    samples_length: u16,
    sample_dimensions: u8,
    number_of_actions: u8,
    engine: EngineModel<'a>,
}

impl<'a> ModelHeader<'a> {
    /// Valida el descriptor: magic, campos no nulos y cabecera ML4F.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, ModelError> {
        let mut cursor = ByteCursor::new(bytes);

        let magic0 = cursor.read_u32()?;
        if magic0 != MODEL_HEADER_MAGIC0 {
            return Err(ModelError::BadMagic {
                field: "model magic0",
                expected: MODEL_HEADER_MAGIC0,
                found: magic0,
            });
        }

        let header_size = cursor.read_u16()?;
        let samples_period = cursor.read_u16()?;
        let samples_length = cursor.read_u16()?;
        let sample_dimensions = cursor.read_u8()?;
        cursor.skip(HEADER_RESERVED_BYTES)?;
        let number_of_actions = cursor.read_u8()?;

        if samples_period == 0 {
            return Err(ModelError::ZeroField("samples_period"));
        }
        if samples_length == 0 {
            return Err(ModelError::ZeroField("samples_length"));
        }
        if sample_dimensions == 0 {
            return Err(ModelError::ZeroField("sample_dimensions"));
        }
        if number_of_actions == 0 {
            return Err(ModelError::ZeroField("number_of_actions"));
        }

        let engine_offset = header_size as usize;
        let engine_bytes = bytes
            .get(engine_offset..)
            .ok_or(ModelError::Truncated {
                offset: engine_offset,
                needed: 0,
                len: bytes.len(),
            })?;
        let engine = EngineModel::parse(engine_bytes)?;

        Ok(Self {
            bytes,
            header_size,
            samples_period,
            samples_length,
            sample_dimensions,
            number_of_actions,
            engine,
        })
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn header_size(&self) -> u16 {
        self.header_size
    }

    pub fn samples_period(&self) -> u16 {
        self.samples_period
    }

    pub fn samples_length(&self) -> u16 {
        self.samples_length
    }

    pub fn sample_dimensions(&self) -> u8 {
        self.sample_dimensions
    }

    pub fn number_of_actions(&self) -> u8 {
        self.number_of_actions
    }

    pub fn engine_model(&self) -> EngineModel<'a> {
        self.engine
    }

    /// Recorre las acciones validando cada etiqueta. Las acciones viven entre
    /// el final de los campos fijos y `header_size`.
    pub fn actions(&self) -> Actions<'a> {
        let end = (self.header_size as usize).min(self.bytes.len());
        Actions {
            cursor: ByteCursor::at(&self.bytes[..end], ACTIONS_OFFSET),
            index: 0,
            remaining: self.number_of_actions as usize,
        }
    }
}

/// Iterador sobre las acciones del descriptor
pub struct Actions<'a> {
    cursor: ByteCursor<'a>,
    index: usize,
    remaining: usize,
}

impl<'a> Actions<'a> {
    fn read_action(&mut self) -> Result<Action<'a>, ModelError> {
        let threshold = self.cursor.read_f32()?;
        let label_length = self.cursor.read_u8()? as usize;
        let offset = self.cursor.position();
        let label_bytes = self.cursor.take(label_length)?;

        // Un único NUL y exactamente en el último byte
        let label = CStr::from_bytes_with_nul(label_bytes).map_err(|_| ModelError::CorruptLabel {
            index: self.index,
            offset,
        })?;

        self.cursor.align(ACTION_ALIGNMENT);
        Ok(Action { label, threshold })
    }
}

impl<'a> Iterator for Actions<'a> {
    type Item = Result<Action<'a>, ModelError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let action = self.read_action();
        // Tras un error no se sigue leyendo
        self.remaining = if action.is_ok() { self.remaining - 1 } else { 0 };
        self.index += 1;
        Some(action)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

/// Generador de descriptores, el equivalente en host del generador de
/// cabeceras del entrenador.
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    samples_period: u16,
    samples_length: u16,
    sample_dimensions: u8,
    actions: Vec<(f32, Vec<u8>)>,
}

impl DescriptorBuilder {
    pub fn new(samples_period: u16, samples_length: u16, sample_dimensions: u8) -> Self {
        Self {
            samples_period,
            samples_length,
            sample_dimensions,
            actions: Vec::new(),
        }
    }

    /// Añade una acción; el NUL final se agrega aquí
    pub fn action(mut self, label: &str, threshold: f32) -> Self {
        let mut bytes = label.as_bytes().to_vec();
        bytes.push(0);
        self.actions.push((threshold, bytes));
        self
    }

    /// Añade una acción con los bytes de etiqueta tal cual
    pub fn raw_action(mut self, label: &[u8], threshold: f32) -> Self {
        self.actions.push((threshold, label.to_vec()));
        self
    }

    /// Serializa la cabecera seguida del objeto ML4F.
    ///
    /// Falla si hay más de 255 acciones, alguna etiqueta pasa de 255 bytes o
    /// la cabecera no cabe en `header_size` (u16).
    pub fn build(&self, engine_object: &[u8]) -> Result<Vec<u8>, ModelError> {
        let number_of_actions = u8::try_from(self.actions.len()).map_err(|_| ModelError::TooLarge {
            field: "number_of_actions",
            max: u8::MAX as usize,
        })?;

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MODEL_HEADER_MAGIC0.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&self.samples_period.to_le_bytes());
        bytes.extend_from_slice(&self.samples_length.to_le_bytes());
        bytes.push(self.sample_dimensions);
        bytes.extend_from_slice(&[0u8; HEADER_RESERVED_BYTES]);
        bytes.push(number_of_actions);

        for (threshold, label) in &self.actions {
            let label_length = u8::try_from(label.len()).map_err(|_| ModelError::TooLarge {
                field: "label_length",
                max: u8::MAX as usize,
            })?;
            bytes.extend_from_slice(&threshold.to_le_bytes());
            bytes.push(label_length);
            bytes.extend_from_slice(label);
            let aligned = (bytes.len() + ACTION_ALIGNMENT - 1) & !(ACTION_ALIGNMENT - 1);
            bytes.resize(aligned, 0);
        }

        let header_size = u16::try_from(bytes.len()).map_err(|_| ModelError::TooLarge {
            field: "header_size",
            max: u16::MAX as usize,
        })?;
        bytes[4..6].copy_from_slice(&header_size.to_le_bytes());
        bytes.extend_from_slice(engine_object);
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ml4f_header_only;

    fn two_actions() -> Vec<u8> {
        DescriptorBuilder::new(20, 42, 3)
            .action("shake", 0.5)
            .action("still", 0.75)
            .build(&ml4f_header_only(&[24], &[2])).unwrap()
    }

    #[test]
    fn test_parse_valid_descriptor() {
        let bytes = two_actions();
        let header = ModelHeader::parse(&bytes).unwrap();

        assert_eq!(header.samples_period(), 20);
        assert_eq!(header.samples_length(), 42);
        assert_eq!(header.sample_dimensions(), 3);
        assert_eq!(header.number_of_actions(), 2);
        assert_eq!(header.engine_model().input_len(), 24);
    }

    #[test]
    fn test_actions_round_trip() {
        let bytes = two_actions();
        let header = ModelHeader::parse(&bytes).unwrap();
        let actions: Vec<Action> = header.actions().collect::<Result<_, _>>().unwrap();

        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].name(), "shake");
        assert_eq!(actions[0].threshold, 0.5);
        assert_eq!(actions[1].name(), "still");
        assert_eq!(actions[1].threshold, 0.75);
    }

    #[test]
    fn test_labels_point_into_descriptor() {
        let bytes = two_actions();
        let header = ModelHeader::parse(&bytes).unwrap();
        let first = header.actions().next().unwrap().unwrap();

        // 20 (campos fijos) + 4 (umbral) + 1 (longitud)
        assert_eq!(first.label.as_ptr() as *const u8, bytes[25..].as_ptr());
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = two_actions();
        bytes[0] = b'X';
        assert!(matches!(
            ModelHeader::parse(&bytes),
            Err(ModelError::BadMagic {
                field: "model magic0",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_zero_actions() {
        let bytes = DescriptorBuilder::new(20, 42, 3).build(&ml4f_header_only(&[24], &[0])).unwrap();
        assert_eq!(
            ModelHeader::parse(&bytes),
            Err(ModelError::ZeroField("number_of_actions"))
        );
    }

    #[test]
    fn test_rejects_zero_geometry() {
        let engine = ml4f_header_only(&[24], &[1]);
        for (period, length, dims, field) in [
            (0, 42, 3, "samples_period"),
            (20, 0, 3, "samples_length"),
            (20, 42, 0, "sample_dimensions"),
        ] {
            let bytes = DescriptorBuilder::new(period, length, dims)
                .action("a", 0.5)
                .build(&engine).unwrap();
            assert_eq!(ModelHeader::parse(&bytes), Err(ModelError::ZeroField(field)));
        }
    }

    #[test]
    fn test_rejects_missing_engine_header() {
        let bytes = DescriptorBuilder::new(20, 42, 3).action("a", 0.5).build(&[]).unwrap();
        assert!(matches!(
            ModelHeader::parse(&bytes),
            Err(ModelError::Truncated { .. })
        ));
    }

    #[test]
    fn test_rejects_truncated_header() {
        let bytes = two_actions();
        assert!(matches!(
            ModelHeader::parse(&bytes[..12]),
            Err(ModelError::Truncated { .. })
        ));
    }

    #[test]
    fn test_label_without_final_nul() {
        let bytes = DescriptorBuilder::new(20, 42, 3)
            .action("ok", 0.5)
            .raw_action(b"bad!", 0.5)
            .build(&ml4f_header_only(&[24], &[2])).unwrap();
        let header = ModelHeader::parse(&bytes).unwrap();
        let result: Result<Vec<Action>, _> = header.actions().collect();
        assert!(matches!(
            result,
            Err(ModelError::CorruptLabel { index: 1, .. })
        ));
    }

    #[test]
    fn test_label_with_embedded_nul() {
        let bytes = DescriptorBuilder::new(20, 42, 3)
            .raw_action(b"ab\0c\0", 0.5)
            .build(&ml4f_header_only(&[24], &[1])).unwrap();
        let header = ModelHeader::parse(&bytes).unwrap();
        assert!(matches!(
            header.actions().next(),
            Some(Err(ModelError::CorruptLabel { index: 0, .. }))
        ));
    }

    #[test]
    fn test_empty_label_is_corrupt() {
        let bytes = DescriptorBuilder::new(20, 42, 3)
            .raw_action(b"", 0.5)
            .build(&ml4f_header_only(&[24], &[1])).unwrap();
        let header = ModelHeader::parse(&bytes).unwrap();
        assert!(matches!(
            header.actions().next(),
            Some(Err(ModelError::CorruptLabel { .. }))
        ));
    }

    #[test]
    fn test_action_count_larger_than_records() {
        let mut bytes = two_actions();
        // Declarar 3 acciones con solo 2 registros: el recorrido topa con header_size
        bytes[19] = 3;
        let header = ModelHeader::parse(&bytes).unwrap();
        let result: Result<Vec<Action>, _> = header.actions().collect();
        assert!(matches!(result, Err(ModelError::Truncated { .. })));
    }

    #[test]
    fn test_iteration_stops_after_error() {
        let bytes = DescriptorBuilder::new(20, 42, 3)
            .raw_action(b"x", 0.5)
            .action("y", 0.5)
            .build(&ml4f_header_only(&[24], &[2])).unwrap();
        let header = ModelHeader::parse(&bytes).unwrap();
        let mut actions = header.actions();
        assert!(actions.next().unwrap().is_err());
        assert!(actions.next().is_none());
    }

    #[test]
    fn test_builder_rejects_long_label() {
        let label = "x".repeat(255);
        let result = DescriptorBuilder::new(20, 42, 3)
            .action(&label, 0.5)
            .build(&ml4f_header_only(&[24], &[1]));
        assert_eq!(
            result,
            Err(ModelError::TooLarge {
                field: "label_length",
                max: 255
            })
        );
    }

    #[test]
    fn test_builder_rejects_too_many_actions() {
        let builder = (0..256).fold(DescriptorBuilder::new(20, 42, 3), |builder, _| {
            builder.action("a", 0.5)
        });
        assert_eq!(
            builder.build(&ml4f_header_only(&[24], &[1])),
            Err(ModelError::TooLarge {
                field: "number_of_actions",
                max: 255
            })
        );
    }

    #[test]
    fn test_builder_accepts_limits() {
        let label = "x".repeat(254);
        let bytes = DescriptorBuilder::new(20, 42, 3)
            .action(&label, 0.5)
            .build(&ml4f_header_only(&[24], &[1]))
            .unwrap();
        let header = ModelHeader::parse(&bytes).unwrap();
        assert_eq!(header.actions().next().unwrap().unwrap().name(), label);
    }

    #[test]
    fn test_builder_rejects_oversized_header() {
        // 255 registros de 4 + 1 + 255 bytes no caben en un u16
        let label = "x".repeat(254);
        let builder = (0..255).fold(DescriptorBuilder::new(20, 42, 3), |builder, _| {
            builder.action(&label, 0.5)
        });
        assert_eq!(
            builder.build(&ml4f_header_only(&[24], &[1])),
            Err(ModelError::TooLarge {
                field: "header_size",
                max: 65535
            })
        );
    }
}
