use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// Record layout: `[u32 le: len][bincode: Event][u32 le: crc32(payload)]`.
fn write_record(writer: &mut impl Write, event: &Event) -> io::Result<()> {
    let payload = bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(payload.len()).map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "record too large"))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    Ok(())
}

/// Reads one record no longer than `remaining` bytes and returns it with its
/// size on disk. `Ok(None)` means a clean end, a torn tail, or a bad checksum;
/// everything after that point is ignored.
fn read_record(reader: &mut impl Read, remaining: u64) -> io::Result<Option<(Event, u64)>> {
    let mut len_buf = [0u8; 4];
    if !read_or_eof(reader, &mut len_buf)? {
        return Ok(None);
    }
    let len = u32::from_le_bytes(len_buf);
    let record_len = u64::from(len) + 8;
    // A length prefix that runs past the end of the file is torn or garbage.
    if record_len > remaining {
        return Ok(None);
    }
    let mut payload = vec![0u8; len as usize];
    if !read_or_eof(reader, &mut payload)? {
        return Ok(None);
    }
    let mut crc_buf = [0u8; 4];
    if !read_or_eof(reader, &mut crc_buf)? {
        return Ok(None);
    }
    if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
        return Ok(None);
    }
    Ok(bincode::deserialize(&payload).ok().map(|event| (event, record_len)))
}

fn read_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Append-only event log backing [`crate::store::WalStore`].
///
/// Appends are buffered and made durable in batches by `flush_sync`. A crash
/// mid-write leaves a torn last record, which replay drops.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
}

impl Wal {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_compact: 0,
        })
    }

    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    /// Buffer one record. Not durable until `flush_sync`.
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        write_record(&mut self.writer, event)?;
        self.appends_since_compact += 1;
        Ok(())
    }

    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn compact_path(path: &Path) -> PathBuf {
        path.with_extension("wal.tmp")
    }

    /// Write `events` to the side file and fsync it. Slow; no lock needed.
    pub fn write_compact_file(path: &Path, events: &[Event]) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(Self::compact_path(path))?);
        for event in events {
            write_record(&mut writer, event)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    /// Rename the side file over the log and reopen for appends.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        fs::rename(Self::compact_path(&self.path), &self.path)?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.appends_since_compact = 0;
        Ok(())
    }

    #[cfg(test)]
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        Self::write_compact_file(&self.path, events)?;
        self.swap_compact_file()
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Every intact record in order. A missing file replays as empty. A torn or
    /// corrupt tail is cut off so later appends follow the last good record.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let mut events = Vec::new();
        let mut consumed: u64 = 0;
        while let Some((event, record_len)) = read_record(&mut reader, file_len - consumed)? {
            consumed += record_len;
            events.push(event);
        }
        if consumed < file_len {
            tracing::warn!(
                path = %path.display(),
                discarded_bytes = file_len - consumed,
                "dropping torn or corrupt WAL tail"
            );
            OpenOptions::new().write(true).open(path)?.set_len(consumed)?;
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AdminSettings, Booking};
    use chrono::{TimeZone, Utc};

    fn tmp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("learnslot_test_wal");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = fs::remove_file(&path);
        path
    }

    fn created(id: &str, hour: u32) -> Event {
        let start = Utc.with_ymd_and_hms(2025, 3, 4, hour, 0, 0).unwrap();
        Event::BookingCreated {
            booking: Booking::new(id.into(), "u1".into(), "c1".into(), start, 30),
        }
    }

    #[test]
    fn append_and_replay() {
        let path = tmp_path("append_and_replay.wal");
        let events = vec![
            created("b1", 9),
            Event::BookingCancelled { id: "b1".into() },
            Event::AdminSettingsSaved {
                settings: AdminSettings { oauth_url: "https://sso.example.com".into() },
            },
        ];
        {
            let mut wal = Wal::open(&path).unwrap();
            for e in &events {
                wal.append(e).unwrap();
            }
        }
        assert_eq!(Wal::replay(&path).unwrap(), events);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn torn_tail_is_dropped() {
        let path = tmp_path("torn_tail.wal");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&created("b1", 9)).unwrap();
        }
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[42, 0, 0, 0, 1, 2]).unwrap();
        }
        assert_eq!(Wal::replay(&path).unwrap(), vec![created("b1", 9)]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn oversized_length_prefix_is_a_torn_tail() {
        let path = tmp_path("oversized_len.wal");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&created("b1", 9)).unwrap();
        }
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&0xFFFF_FFF0u32.to_le_bytes()).unwrap();
            f.write_all(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        }
        assert_eq!(Wal::replay(&path).unwrap(), vec![created("b1", 9)]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn appends_after_torn_tail_survive_next_replay() {
        let path = tmp_path("append_after_torn.wal");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&created("b1", 9)).unwrap();
        }
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[42, 0, 0, 0, 1, 2]).unwrap();
        }
        assert_eq!(Wal::replay(&path).unwrap(), vec![created("b1", 9)]);
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&created("b2", 10)).unwrap();
        }
        assert_eq!(Wal::replay(&path).unwrap(), vec![created("b1", 9), created("b2", 10)]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn bad_checksum_stops_replay() {
        let path = tmp_path("bad_crc.wal");
        {
            let payload = bincode::serialize(&created("b1", 9)).unwrap();
            let mut f = File::create(&path).unwrap();
            f.write_all(&(payload.len() as u32).to_le_bytes()).unwrap();
            f.write_all(&payload).unwrap();
            f.write_all(&0xDEAD_BEEFu32.to_le_bytes()).unwrap();
        }
        assert!(Wal::replay(&path).unwrap().is_empty());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_file_replays_empty() {
        let path = tmp_path("never_written.wal");
        assert!(Wal::replay(&path).unwrap().is_empty());
    }

    #[test]
    fn open_creates_parent_dir() {
        let dir = std::env::temp_dir().join("learnslot_test_wal").join("nested_open");
        let _ = fs::remove_dir_all(&dir);
        let path = dir.join("data.wal");
        Wal::open(&path).unwrap();
        assert!(path.exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn compact_shrinks_log_and_accepts_appends() {
        let path = tmp_path("compact.wal");
        let mut wal = Wal::open(&path).unwrap();
        for i in 0..20 {
            let id = format!("churn{i}");
            wal.append(&created(&id, 9)).unwrap();
            wal.append(&Event::BookingCancelled { id }).unwrap();
        }
        wal.append(&created("keep", 10)).unwrap();
        assert_eq!(wal.appends_since_compact(), 41);
        let before = fs::metadata(&path).unwrap().len();

        wal.compact(&[created("keep", 10)]).unwrap();
        assert_eq!(wal.appends_since_compact(), 0);
        assert!(fs::metadata(&path).unwrap().len() < before);

        wal.append(&created("after", 11)).unwrap();
        drop(wal);
        assert_eq!(Wal::replay(&path).unwrap(), vec![created("keep", 10), created("after", 11)]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn buffered_appends_land_after_flush() {
        let path = tmp_path("buffered.wal");
        let events: Vec<Event> = (0..5).map(|i| created(&format!("b{i}"), 8 + i)).collect();
        {
            let mut wal = Wal::open(&path).unwrap();
            for e in &events {
                wal.append_buffered(e).unwrap();
            }
            wal.flush_sync().unwrap();
        }
        assert_eq!(Wal::replay(&path).unwrap(), events);
        let _ = fs::remove_file(&path);
    }
}
