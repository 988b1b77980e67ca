//! Frontera con el motor de inferencia ML4F.
//!
//! El motor en sí es externo: aquí solo se valida su cabecera dentro del
//! descriptor, se leen las formas de entrada/salida y se define el trait con
//! el que se invoca.

use crate::byte_cursor::ByteCursor;
use crate::model_header::ModelError;

pub const ML4F_MAGIC0: u32 = 0x3047_0F62;
pub const ML4F_MAGIC1: u32 = 0x4634_4C4D;

/// Offset de las formas dentro de la cabecera ML4F (16 campos de 32 bits)
pub const ML4F_SHAPES_OFFSET: usize = 64;

/// Máximo de elementos de un tensor de entrada o salida
pub const MAX_SHAPE_ELEMENTS: usize = 1 << 16;

/// Motor de inferencia externo
pub trait InferenceEngine {
    /// Ejecuta el modelo sobre `input` y escribe `output`. 0 indica éxito;
    /// cualquier otro valor es un código de error del motor.
    fn invoke(&mut self, model: &EngineModel<'_>, input: &[f32], output: &mut [f32]) -> i32;
}

impl<F> InferenceEngine for F
where
    F: FnMut(&EngineModel<'_>, &[f32], &mut [f32]) -> i32,
{
    fn invoke(&mut self, model: &EngineModel<'_>, input: &[f32], output: &mut [f32]) -> i32 {
        self(model, input, output)
    }
}

/// Cabecera ML4F validada. Solo toma prestada la memoria del descriptor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineModel<'a> {
    bytes: &'a [u8],
    header_size: u32,
    object_size: u32,
    input_shape: &'a [u8],
    output_shape: &'a [u8],
    input_len: usize,
    output_len: usize,
}

impl<'a> EngineModel<'a> {
    /// Valida el par de magics y localiza las formas. `bytes` empieza en la
    /// cabecera ML4F y llega hasta el final del descriptor.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, ModelError> {
        let mut cursor = ByteCursor::new(bytes);

        let magic0 = cursor.read_u32()?;
        if magic0 != ML4F_MAGIC0 {
            return Err(ModelError::BadMagic {
                field: "ml4f magic0",
                expected: ML4F_MAGIC0,
                found: magic0,
            });
        }
        let magic1 = cursor.read_u32()?;
        if magic1 != ML4F_MAGIC1 {
            return Err(ModelError::BadMagic {
                field: "ml4f magic1",
                expected: ML4F_MAGIC1,
                found: magic1,
            });
        }

        let header_size = cursor.read_u32()?;
        let object_size = cursor.read_u32()?;

        // El motor lee pesos hasta object_size: tiene que caber entero
        let object = ByteCursor::new(bytes).take(object_size as usize)?;
        if header_size > object_size {
            return Err(ModelError::Truncated {
                offset: 0,
                needed: header_size as usize,
                len: object_size as usize,
            });
        }

        let header = &object[..header_size as usize];
        let mut shapes = ByteCursor::at(header, ML4F_SHAPES_OFFSET);
        let input_shape = read_shape(&mut shapes)?;
        let output_shape = read_shape(&mut shapes)?;

        Ok(Self {
            bytes: object,
            header_size,
            object_size,
            input_shape,
            output_shape,
            input_len: shape_elements(input_shape, "input shape")?,
            output_len: shape_elements(output_shape, "output shape")?,
        })
    }

    /// Objeto ML4F completo (cabecera + pesos)
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn header_size(&self) -> u32 {
        self.header_size
    }

    pub fn object_size(&self) -> u32 {
        self.object_size
    }

    pub fn input_shape(&self) -> impl Iterator<Item = u32> + 'a {
        shape_dims(self.input_shape)
    }

    pub fn output_shape(&self) -> impl Iterator<Item = u32> + 'a {
        shape_dims(self.output_shape)
    }

    /// Número de elementos de la entrada
    pub fn input_len(&self) -> usize {
        self.input_len
    }

    /// Número de elementos de la salida
    pub fn output_len(&self) -> usize {
        self.output_len
    }
}

/// Lee una forma terminada en cero y devuelve sus dimensiones sin el terminador
fn read_shape<'a>(cursor: &mut ByteCursor<'a>) -> Result<&'a [u8], ModelError> {
    let mut dims_cursor = cursor.clone();
    let mut dims = 0;
    while cursor.read_u32()? != 0 {
        dims += 1;
    }
    dims_cursor.take(dims * 4)
}

fn shape_dims(raw: &[u8]) -> impl Iterator<Item = u32> + '_ {
    raw.chunks_exact(4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Producto de las dimensiones, acotado por `MAX_SHAPE_ELEMENTS`
fn shape_elements(raw: &[u8], field: &'static str) -> Result<usize, ModelError> {
    let too_large = ModelError::TooLarge {
        field,
        max: MAX_SHAPE_ELEMENTS,
    };
    let mut elements = 1usize;
    for dim in shape_dims(raw) {
        elements = elements
            .checked_mul(dim as usize)
            .filter(|&n| n <= MAX_SHAPE_ELEMENTS)
            .ok_or(too_large.clone())?;
    }
    Ok(elements)
}

/// Índice del valor máximo; en caso de empate gana el primero
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &value) in values.iter().enumerate() {
        match best {
            Some((_, max)) if value <= max => {}
            _ => best = Some((index, value)),
        }
    }
    best.map(|(index, _)| index)
}

/// Construye un objeto ML4F sin pesos con las formas dadas. Sirve para
/// generar descriptores en host cuando el motor real no está disponible.
pub fn ml4f_header_only(input_shape: &[u32], output_shape: &[u32]) -> Vec<u8> {
    let header_size = ML4F_SHAPES_OFFSET + 4 * (input_shape.len() + output_shape.len() + 2);
    let mut bytes = Vec::with_capacity(header_size);

    bytes.extend_from_slice(&ML4F_MAGIC0.to_le_bytes());
    bytes.extend_from_slice(&ML4F_MAGIC1.to_le_bytes());
    bytes.extend_from_slice(&(header_size as u32).to_le_bytes());
    bytes.extend_from_slice(&(header_size as u32).to_le_bytes());
    bytes.resize(ML4F_SHAPES_OFFSET, 0);

    for shape in [input_shape, output_shape] {
        for dim in shape {
            bytes.extend_from_slice(&dim.to_le_bytes());
        }
        bytes.extend_from_slice(&0u32.to_le_bytes());
    }

    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header_only_object() {
        let bytes = ml4f_header_only(&[8, 3], &[5]);
        let model = EngineModel::parse(&bytes).unwrap();

        assert_eq!(model.input_shape().collect::<Vec<_>>(), vec![8, 3]);
        assert_eq!(model.output_shape().collect::<Vec<_>>(), vec![5]);
        assert_eq!(model.input_len(), 24);
        assert_eq!(model.output_len(), 5);
        assert_eq!(model.object_size() as usize, bytes.len());
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = ml4f_header_only(&[24], &[5]);
        bytes[4] ^= 0xFF;
        assert!(matches!(
            EngineModel::parse(&bytes),
            Err(ModelError::BadMagic {
                field: "ml4f magic1",
                ..
            })
        ));
    }

    #[test]
    fn test_object_larger_than_descriptor() {
        let mut bytes = ml4f_header_only(&[24], &[5]);
        bytes[12..16].copy_from_slice(&1000u32.to_le_bytes());
        assert!(matches!(
            EngineModel::parse(&bytes),
            Err(ModelError::Truncated { .. })
        ));
    }

    #[test]
    fn test_shape_without_terminator() {
        let mut bytes = ml4f_header_only(&[24], &[5]);
        // Quitar el terminador de la forma de salida
        let len = bytes.len();
        bytes.truncate(len - 4);
        let size = (len - 4) as u32;
        bytes[8..12].copy_from_slice(&size.to_le_bytes());
        bytes[12..16].copy_from_slice(&size.to_le_bytes());
        assert!(matches!(
            EngineModel::parse(&bytes),
            Err(ModelError::Truncated { .. })
        ));
    }

    #[test]
    fn test_argmax_first_wins() {
        assert_eq!(argmax(&[0.1, 0.9, 0.9, 0.2]), Some(1));
        assert_eq!(argmax(&[0.0, 0.0]), Some(0));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_closure_engine() {
        let bytes = ml4f_header_only(&[2], &[2]);
        let model = EngineModel::parse(&bytes).unwrap();
        let mut engine = |_: &EngineModel<'_>, input: &[f32], output: &mut [f32]| {
            output.copy_from_slice(input);
            0
        };
        let mut out = [0.0f32; 2];
        assert_eq!(engine.invoke(&model, &[0.25, 0.75], &mut out), 0);
        assert_eq!(out, [0.25, 0.75]);
    }

    #[test]
    fn test_overflowing_shape_is_rejected() {
        let bytes = ml4f_header_only(&[4], &[u32::MAX, u32::MAX]);
        assert_eq!(
            EngineModel::parse(&bytes),
            Err(ModelError::TooLarge {
                field: "output shape",
                max: MAX_SHAPE_ELEMENTS
            })
        );
    }

    #[test]
    fn test_oversized_shape_is_rejected() {
        let bytes = ml4f_header_only(&[65536, 65536], &[5]);
        assert!(matches!(
            EngineModel::parse(&bytes),
            Err(ModelError::TooLarge {
                field: "input shape",
                ..
            })
        ));

        let bytes = ml4f_header_only(&[4], &[MAX_SHAPE_ELEMENTS as u32]);
        assert_eq!(
            EngineModel::parse(&bytes).unwrap().output_len(),
            MAX_SHAPE_ELEMENTS
        );
    }
}
