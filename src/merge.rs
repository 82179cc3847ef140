//! The output controller: schedules readers, merges packets across
//! tracks by timecode and drives the block sink.

use std::collections::HashSet;

use crate::context::RuntimeContext;
use crate::error::{Error, Result};
use crate::packetizer::{PacketizerId, PacketizerSet};
use crate::reader::{FileIdentification, ReadStatus, Reader};
use crate::sink::{Block, BlockSink};

/// Index of a reader within the muxer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReaderId(usize);

impl ReaderId {
    /// The raw index.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Counters accumulated over one `run`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MuxStats {
    /// Blocks handed to the sink.
    pub blocks_written: u64,
    /// Frames dropped after recoverable bitstream errors.
    pub dropped_frames: u64,
}

struct ReaderEntry {
    reader: Box<dyn Reader>,
    targets: Vec<PacketizerId>,
    exhausted: HashSet<usize>,
}

impl ReaderEntry {
    fn is_done(&self) -> bool {
        self.targets.iter().all(|t| self.exhausted.contains(&t.index()))
    }
}

/// The single-threaded muxing pipeline: N readers, M packetizers, one
/// sink. The muxer pulls from readers until every packetizer that still
/// has input also has a queued packet, then emits the packet with the
/// smallest timecode (ties broken by track index), preserving each
/// track's decode order.
pub struct Muxer<S: BlockSink> {
    ctx: RuntimeContext,
    packetizers: PacketizerSet,
    readers: Vec<ReaderEntry>,
    sink: S,
}

impl<S: BlockSink> Muxer<S> {
    /// A muxer with a fresh [`RuntimeContext`].
    pub fn new(sink: S) -> Self {
        Self::with_context(sink, RuntimeContext::new())
    }

    /// A muxer sharing an existing context (UID set, verbosity).
    pub fn with_context(sink: S, ctx: RuntimeContext) -> Self {
        Self {
            ctx,
            packetizers: PacketizerSet::new(),
            readers: Vec::new(),
            sink,
        }
    }

    /// The packetizer set, for wiring up readers.
    pub fn packetizers_mut(&mut self) -> &mut PacketizerSet {
        &mut self.packetizers
    }

    /// The packetizer set.
    pub fn packetizers(&self) -> &PacketizerSet {
        &self.packetizers
    }

    /// Register a reader. Its `packetizers()` list determines which
    /// targets the muxer will pull through it.
    pub fn add_reader(&mut self, reader: Box<dyn Reader>) -> ReaderId {
        let targets = reader.packetizers();
        self.readers.push(ReaderEntry {
            reader,
            targets,
            exhausted: HashSet::new(),
        });
        ReaderId(self.readers.len() - 1)
    }

    /// Identify every input file without muxing.
    pub fn identify(&self) -> Vec<FileIdentification> {
        self.readers.iter().map(|e| e.reader.identify()).collect()
    }

    /// The sink, e.g. to inspect collected output after `run`.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the muxer and hand back the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Run the pipeline to completion: render headers, merge packets,
    /// flush, finalize. On a fatal error the remaining tracks are still
    /// flushed best-effort before the error is returned.
    pub fn run(&mut self) -> Result<MuxStats> {
        let mut stats = MuxStats::default();

        let run_result = self.render_headers().and_then(|()| self.merge_loop(&mut stats));
        if let Err(e) = &run_result {
            log::warn!("fatal error, flushing the remaining tracks: {e}");
        }
        let shutdown_result = self.shutdown(&mut stats);

        run_result.and(shutdown_result).map(|()| stats)
    }

    /// Packetizer indices in output order: user-ordered tracks first by
    /// their position, then the rest in creation order.
    fn ordered_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.packetizers.len()).collect();
        indices.sort_by_key(|&i| {
            let order = self
                .packetizers
                .get(PacketizerId(i))
                .and_then(|p| p.common().info().order)
                .unwrap_or(usize::MAX);
            (order, i)
        });
        indices
    }

    fn render_headers(&mut self) -> Result<()> {
        for index in self.ordered_indices() {
            let Some(packetizer) = self.packetizers.get_mut(PacketizerId(index)) else {
                continue;
            };
            packetizer.set_headers(&mut self.ctx);
            if let Some(headers) = packetizer.common().headers() {
                self.sink.add_track(headers)?;
            }
        }
        Ok(())
    }

    /// Pull from every reader until each live target has a queued packet,
    /// then emit the oldest queued packet. Repeats until all readers are
    /// exhausted and every queue has drained through `shutdown`.
    fn merge_loop(&mut self, stats: &mut MuxStats) -> Result<()> {
        let progress_reader = self
            .readers
            .iter()
            .enumerate()
            .max_by_key(|(_, e)| e.reader.display_priority())
            .map(|(i, _)| i);

        loop {
            self.refill(stats)?;

            match self.best_queued() {
                Some(id) => {
                    self.emit_block(id, stats)?;
                    if stats.blocks_written % 1000 == 0 {
                        if let Some(i) = progress_reader {
                            self.readers[i].reader.display_progress(false);
                        }
                    }
                }
                None => {
                    if self.readers.iter().all(|e| e.is_done()) {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Give every reader with an empty, still-live target a chance to
    /// produce packets for it.
    fn refill(&mut self, stats: &mut MuxStats) -> Result<()> {
        for entry in &mut self.readers {
            for target in entry.targets.clone() {
                while !entry.exhausted.contains(&target.index()) {
                    let empty = self
                        .packetizers
                        .get(target)
                        .is_none_or(|p| p.common().queue_is_empty());
                    if !empty {
                        break;
                    }

                    match entry.reader.read(target, &mut self.packetizers) {
                        Ok(ReadStatus::MoreData) => {}
                        Ok(ReadStatus::Done) => {
                            entry.exhausted.insert(target.index());
                            // Drain the packetizer's reorder state now so
                            // its tail packets take part in the merge.
                            if let Some(p) = self.packetizers.get_mut(target) {
                                match p.flush() {
                                    Ok(()) => {}
                                    Err(e) if e.is_recoverable() => {
                                        stats.dropped_frames += 1;
                                        log::warn!("Error: {e}");
                                    }
                                    Err(e) => return Err(e),
                                }
                            }
                        }
                        Err(e) if e.is_recoverable() => {
                            stats.dropped_frames += 1;
                            log::warn!("Error: {e}");
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }
        Ok(())
    }

    /// The packetizer whose head-of-queue packet has the smallest
    /// timecode; ties go to the lower track index.
    fn best_queued(&self) -> Option<PacketizerId> {
        self.packetizers
            .iter()
            .filter_map(|(id, p)| p.common().peek_timecode().map(|tc| (tc, id)))
            .min_by_key(|&(tc, id)| (tc, id.index()))
            .map(|(_, id)| id)
    }

    fn emit_block(&mut self, id: PacketizerId, stats: &mut MuxStats) -> Result<()> {
        let Some(packetizer) = self.packetizers.get_mut(id) else {
            return Ok(());
        };
        let Some(packet) = packetizer.common_mut().pop_packet() else {
            return Ok(());
        };
        let track_uid = packetizer
            .common()
            .uid()
            .ok_or_else(|| Error::Programming("block emitted before the track headers were rendered".into()))?;

        self.sink.write_block(Block {
            track_uid,
            timecode: packet.timecode,
            duration: packet.duration,
            payload: packet.payload,
            references: packet.references,
        })?;
        stats.blocks_written += 1;
        Ok(())
    }

    /// Flush every packetizer in track order, drain the remaining
    /// packets by timecode, re-emit any re-rendered headers and finalize
    /// the sink. Per-track flush errors do not stop the other tracks;
    /// the first one is returned at the end.
    fn shutdown(&mut self, stats: &mut MuxStats) -> Result<()> {
        let mut first_error = None;

        for index in self.ordered_indices() {
            if let Some(p) = self.packetizers.get_mut(PacketizerId(index)) {
                match p.flush() {
                    Ok(()) => {}
                    Err(e) if e.is_recoverable() => {
                        stats.dropped_frames += 1;
                        log::warn!("Error: {e}");
                    }
                    Err(e) => first_error = first_error.or(Some(e)),
                }
            }
        }

        while let Some(id) = self.best_queued() {
            self.emit_block(id, stats)?;
        }

        // Metadata extracted mid-stream (picture size, aspect ratio,
        // codec private data) re-rendered some headers; hand the final
        // versions to the sink.
        for index in 0..self.packetizers.len() {
            let Some(p) = self.packetizers.get_mut(PacketizerId(index)) else {
                continue;
            };
            if p.common().headers_stale() {
                p.set_headers(&mut self.ctx);
                if let Some(headers) = p.common().headers() {
                    self.sink.add_track(headers)?;
                }
            }
        }

        for entry in &mut self.readers {
            entry.reader.display_progress(true);
        }
        self.sink.finish()?;

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
