use crate::model_header::ModelError;

/// Cursor de lectura little-endian sobre un slice, con comprobación de
/// límites en cada paso.
#[derive(Debug, Clone)]
pub(crate) struct ByteCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn at(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8], ModelError> {
        let truncated = ModelError::Truncated {
            offset: self.pos,
            needed: len,
            len: self.bytes.len(),
        };
        let end = self.pos.checked_add(len).ok_or(truncated.clone())?;
        let slice = self.bytes.get(self.pos..end).ok_or(truncated)?;
        self.pos = end;
        Ok(slice)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), ModelError> {
        self.take(len).map(|_| ())
    }

    /// Avanza hasta el siguiente múltiplo de `alignment` (potencia de dos)
    pub fn align(&mut self, alignment: usize) {
        self.pos = (self.pos + alignment - 1) & !(alignment - 1);
    }

    pub fn read_u8(&mut self) -> Result<u8, ModelError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ModelError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, ModelError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_f32(&mut self) -> Result<f32, ModelError> {
        self.read_u32().map(f32::from_bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_little_endian() {
        let bytes = [0x4C, 0x44, 0x4F, 0x4D, 0x60, 0x00, 0x03];
        let mut cursor = ByteCursor::new(&bytes);
        assert_eq!(cursor.read_u32().unwrap(), 0x4D4F_444C);
        assert_eq!(cursor.read_u16().unwrap(), 0x60);
        assert_eq!(cursor.read_u8().unwrap(), 3);
        assert_eq!(cursor.position(), bytes.len());
    }

    #[test]
    fn test_out_of_range_read_is_an_error() {
        let bytes = [1, 2, 3];
        let mut cursor = ByteCursor::at(&bytes, 1);
        assert_eq!(
            cursor.read_u32(),
            Err(ModelError::Truncated {
                offset: 1,
                needed: 4,
                len: 3
            })
        );
        // Una lectura fallida no mueve el cursor
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn test_huge_take_does_not_overflow() {
        let bytes = [0u8; 4];
        let mut cursor = ByteCursor::at(&bytes, 2);
        assert!(cursor.take(usize::MAX).is_err());
    }

    #[test]
    fn test_align() {
        let bytes = [0u8; 16];
        let mut cursor = ByteCursor::at(&bytes, 37);
        cursor.align(4);
        assert_eq!(cursor.position(), 40);
        cursor.align(4);
        assert_eq!(cursor.position(), 40);
    }
}
