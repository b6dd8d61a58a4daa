// Persisted user settings. Only the dashboard theme survives a restart, readings and history are
// never written to flash.

use embedded_storage::nor_flash::{NorFlash, NorFlashError};

use crate::errors::TachError;

const MAGIC: [u8; 4] = *b"TTCH";
const VERSION: u8 = 1;

/// Bytes read/written per record. A multiple of every sane flash read/write granularity, the
/// payload only uses the first few.
const RECORD_LEN: usize = 256;

/// Theme flag stored in one dedicated erase sector.
///
/// Layout: magic, version, flag, inverted flag. Anything else (erased flash, torn write) reads as
/// the light theme.
pub struct ThemeStore<F> {
    flash: F,
    offset: u32,
}

impl<F: NorFlash> ThemeStore<F> {
    /// `offset` must be the start of an erase sector reserved for settings
    pub fn new(flash: F, offset: u32) -> Result<Self, TachError> {
        if offset as usize % F::ERASE_SIZE != 0
            || RECORD_LEN % F::WRITE_SIZE != 0
            || RECORD_LEN % F::READ_SIZE != 0
            || RECORD_LEN > F::ERASE_SIZE
        {
            return Err(TachError::FlashAlignment());
        }
        Ok(Self { flash, offset })
    }

    pub fn load_dark_mode(&mut self) -> Result<bool, TachError> {
        Ok(self.read_record()?.unwrap_or(false))
    }

    /// Persist the flag. Skips the erase/write cycle if flash already holds this value.
    pub fn store_dark_mode(&mut self, dark: bool) -> Result<(), TachError> {
        if self.read_record()? == Some(dark) {
            return Ok(());
        }
        self.flash
            .erase(self.offset, self.offset + F::ERASE_SIZE as u32)
            .map_err(|e| TachError::Flash(e.kind()))?;
        self.flash
            .write(self.offset, &encode(dark))
            .map_err(|e| TachError::Flash(e.kind()))?;
        info!("theme saved, dark: {}", dark);
        Ok(())
    }

    /// `None` for erased or corrupt flash
    fn read_record(&mut self) -> Result<Option<bool>, TachError> {
        let mut record = [0u8; RECORD_LEN];
        self.flash
            .read(self.offset, &mut record)
            .map_err(|e| TachError::Flash(e.kind()))?;
        Ok(decode(&record))
    }

    pub fn release(self) -> F {
        self.flash
    }
}

fn encode(dark: bool) -> [u8; RECORD_LEN] {
    let mut record = [0xFFu8; RECORD_LEN];
    record[..4].copy_from_slice(&MAGIC);
    record[4] = VERSION;
    record[5] = dark as u8;
    record[6] = !(dark as u8);
    record
}

fn decode(record: &[u8]) -> Option<bool> {
    if record.len() < 7 || record[..4] != MAGIC || record[4] != VERSION {
        return None;
    }
    match (record[5], record[6]) {
        (0, 0xFF) => Some(false),
        (1, 0xFE) => Some(true),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_storage::nor_flash::{ErrorType, NorFlashErrorKind, ReadNorFlash};

    const SECTOR: usize = 4096;

    /// Two sectors of NOR flash that enforces erase-before-write and counts erases
    struct MockFlash {
        data: std::vec::Vec<u8>,
        erases: usize,
        reads: usize,
    }

    impl MockFlash {
        fn new() -> Self {
            Self {
                data: vec![0xFF; SECTOR * 2],
                erases: 0,
                reads: 0,
            }
        }
    }

    impl ErrorType for MockFlash {
        type Error = NorFlashErrorKind;
    }

    impl ReadNorFlash for MockFlash {
        const READ_SIZE: usize = 1;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            let start = offset as usize;
            let end = start + bytes.len();
            if end > self.data.len() {
                return Err(NorFlashErrorKind::OutOfBounds);
            }
            bytes.copy_from_slice(&self.data[start..end]);
            self.reads += 1;
            Ok(())
        }

        fn capacity(&self) -> usize {
            self.data.len()
        }
    }

    impl NorFlash for MockFlash {
        const WRITE_SIZE: usize = 4;
        const ERASE_SIZE: usize = SECTOR;

        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            if from as usize % SECTOR != 0 || to as usize % SECTOR != 0 {
                return Err(NorFlashErrorKind::NotAligned);
            }
            self.data[from as usize..to as usize].fill(0xFF);
            self.erases += 1;
            Ok(())
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            let start = offset as usize;
            if start + bytes.len() > self.data.len() {
                return Err(NorFlashErrorKind::OutOfBounds);
            }
            // NOR can only clear bits
            for (cell, byte) in self.data[start..].iter_mut().zip(bytes) {
                *cell &= *byte;
            }
            Ok(())
        }
    }

    #[test]
    fn erased_flash_reads_light() {
        let mut store = ThemeStore::new(MockFlash::new(), SECTOR as u32).unwrap();
        assert_eq!(store.load_dark_mode(), Ok(false));
    }

    #[test]
    fn round_trips_both_values() {
        let mut store = ThemeStore::new(MockFlash::new(), SECTOR as u32).unwrap();
        store.store_dark_mode(true).unwrap();
        assert_eq!(store.load_dark_mode(), Ok(true));
        store.store_dark_mode(false).unwrap();
        assert_eq!(store.load_dark_mode(), Ok(false));

        // survives "reboot"
        let flash = store.release();
        let mut store = ThemeStore::new(flash, SECTOR as u32).unwrap();
        assert_eq!(store.load_dark_mode(), Ok(false));
    }

    #[test]
    fn unchanged_value_is_not_rewritten() {
        let mut store = ThemeStore::new(MockFlash::new(), 0).unwrap();
        store.store_dark_mode(true).unwrap();
        store.store_dark_mode(true).unwrap();
        assert_eq!(store.release().erases, 1);
    }

    #[test]
    fn unchanged_value_costs_one_read() {
        let mut store = ThemeStore::new(MockFlash::new(), 0).unwrap();
        store.store_dark_mode(true).unwrap();
        let mut flash = store.release();
        flash.reads = 0;

        let mut store = ThemeStore::new(flash, 0).unwrap();
        store.store_dark_mode(true).unwrap();
        let flash = store.release();
        assert_eq!(flash.reads, 1);
        assert_eq!(flash.erases, 1);
    }

    #[test]
    fn light_on_blank_flash_is_still_written_once() {
        let mut store = ThemeStore::new(MockFlash::new(), 0).unwrap();
        store.store_dark_mode(false).unwrap();
        store.store_dark_mode(false).unwrap();
        assert_eq!(store.release().erases, 1);
    }

    #[test]
    fn corrupt_record_reads_light() {
        let mut flash = MockFlash::new();
        flash.data[..7].copy_from_slice(b"TTCH\x01\x01\x01");
        let mut store = ThemeStore::new(flash, 0).unwrap();
        assert_eq!(store.load_dark_mode(), Ok(false));
    }

    #[test]
    fn rejects_unaligned_offset() {
        assert_eq!(
            ThemeStore::new(MockFlash::new(), 100).err(),
            Some(TachError::FlashAlignment())
        );
    }

    #[test]
    fn flash_errors_are_reported() {
        let mut store = ThemeStore::new(MockFlash::new(), (SECTOR * 2) as u32).unwrap();
        assert_eq!(
            store.load_dark_mode(),
            Err(TachError::Flash(NorFlashErrorKind::OutOfBounds))
        );
    }
}
