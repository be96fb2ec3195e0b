use crate::error::{ReadError, ReadResult};

/// Parsing cursor over a byte window.
///
/// `limit` is the absolute end of the current context, established by the
/// nearest enclosing size header or fixed size frame. Variable length
/// encodings consume exactly up to it.
pub struct ReadState<'a> {
    buf: &'a [u8],
    offset: usize,
    limit: usize,
}

impl<'a> ReadState<'a> {
    pub(crate) fn new(buf: &'a [u8], offset: usize, length: usize) -> ReadResult<Self> {
        let limit = offset
            .checked_add(length)
            .ok_or(ReadError::NotEnoughData)?;
        if limit > buf.len() {
            return Err(ReadError::NotEnoughData);
        }
        Ok(Self { buf, offset, limit })
    }

    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    pub(crate) fn remaining(&self) -> usize {
        self.limit - self.offset
    }

    pub(crate) fn read_slice(&mut self, num_bytes: usize) -> ReadResult<&'a [u8]> {
        if num_bytes > self.remaining() {
            return Err(ReadError::NotEnoughData);
        }
        let slice = &self.buf[self.offset..(self.offset + num_bytes)];
        self.offset += num_bytes;
        Ok(slice)
    }

    pub(crate) fn skip(&mut self, num_bytes: usize) -> ReadResult<()> {
        self.read_slice(num_bytes)?;
        Ok(())
    }

    pub(crate) fn read_u8(&mut self) -> ReadResult<u8> {
        Ok(self.read_slice(1)?[0])
    }

    pub(crate) fn read_i8(&mut self) -> ReadResult<i8> {
        Ok(self.read_slice(1)?[0] as i8)
    }

    pub(crate) fn read_u16(&mut self) -> ReadResult<u16> {
        let data = self.read_slice(2)?;
        Ok(u16::from_be_bytes([data[0], data[1]]))
    }

    pub(crate) fn read_i16(&mut self) -> ReadResult<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub(crate) fn read_i32(&mut self) -> ReadResult<i32> {
        let data = self.read_slice(4)?;
        Ok(i32::from_be_bytes([data[0], data[1], data[2], data[3]]))
    }

    pub(crate) fn read_u32(&mut self) -> ReadResult<u32> {
        Ok(self.read_i32()? as u32)
    }

    pub(crate) fn read_i64(&mut self) -> ReadResult<i64> {
        let data = self.read_slice(8)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(data);
        Ok(i64::from_be_bytes(bytes))
    }

    pub(crate) fn read_f64(&mut self) -> ReadResult<f64> {
        let data = self.read_slice(8)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(data);
        Ok(f64::from_be_bytes(bytes))
    }

    /// Narrows the context to the next `size` bytes. Returns the old limit
    /// which must be passed back to [`Self::exit`].
    pub(crate) fn enter(&mut self, size: usize) -> ReadResult<usize> {
        if size > self.remaining() {
            return Err(ReadError::NotEnoughData);
        }
        let saved = self.limit;
        self.limit = self.offset + size;
        Ok(saved)
    }

    /// Leaves a context entered with [`Self::enter`], checking that it was
    /// fully consumed.
    pub(crate) fn exit(&mut self, saved: usize) -> ReadResult<()> {
        if self.offset != self.limit {
            return Err(ReadError::ExtraBytes);
        }
        self.limit = saved;
        Ok(())
    }

    /// Holds the last `num_bytes` of the context back, so that a variable
    /// length part stops right before a known fixed size tail.
    pub(crate) fn reserve_tail(&mut self, num_bytes: usize) -> ReadResult<()> {
        if num_bytes > self.remaining() {
            return Err(ReadError::NotEnoughData);
        }
        self.limit -= num_bytes;
        Ok(())
    }

    pub(crate) fn release_tail(&mut self, num_bytes: usize) {
        self.limit += num_bytes;
    }

    /// Caps the context at `limit` bytes from the current position, if that
    /// is stricter than the current context. Returns the old limit and
    /// whether the cap took effect.
    pub(crate) fn cap(&mut self, limit: usize) -> (usize, bool) {
        let saved = self.limit;
        match self.offset.checked_add(limit) {
            Some(end) if end < self.limit => {
                self.limit = end;
                (saved, true)
            }
            _ => (saved, false),
        }
    }

    pub(crate) fn uncap(&mut self, saved: usize) {
        self.limit = saved;
    }
}
