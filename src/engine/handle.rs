use std::sync::{Arc, Mutex};

use basedrop::{Collector, Handle, Owned, Shared, SharedCell};
use crossbeam_queue::ArrayQueue;
use four_cc::FourCC;

use crate::{
    engine::{parameters::GranularParameters, EngineMessage},
    parameter::ParameterValueUpdate,
    source::AudioSource,
    Error,
};

// -------------------------------------------------------------------------------------------------

/// A cloneable, `Send` handle to control a [`GranularEngine`](crate::GranularEngine) from
/// other threads.
///
/// Note and parameter messages get queued and are applied by the engine at the start of the next
/// rendered block, in the order they were sent. Audio sources are published atomically: the
/// engine keeps rendering the previous source until it picks up the new one.
#[derive(Clone)]
pub struct GranularEngineHandle {
    message_queue: Arc<ArrayQueue<EngineMessage>>,
    source_cell: Arc<SharedCell<AudioSource>>,
    collector: Arc<Mutex<Collector>>,
    collector_handle: Handle,
}

impl GranularEngineHandle {
    pub(crate) fn new(
        message_queue: Arc<ArrayQueue<EngineMessage>>,
        source_cell: Arc<SharedCell<AudioSource>>,
        collector: Arc<Mutex<Collector>>,
        collector_handle: Handle,
    ) -> Self {
        Self {
            message_queue,
            source_cell,
            collector,
            collector_handle,
        }
    }

    /// Trigger a new note with the given velocity in range `[0, 1]`.
    pub fn note_on(&self, note: u8, velocity: f32) -> Result<(), Error> {
        self.send_message(EngineMessage::NoteOn { note, velocity }, "note_on")
    }

    /// Stop all voices which play the given note. With `allow_tail_off` the voices release,
    /// else they stop immediately.
    pub fn note_off(&self, note: u8, allow_tail_off: bool) -> Result<(), Error> {
        // Force push stop commands to avoid hanging notes...
        self.force_send_message(
            EngineMessage::NoteOff {
                note,
                allow_tail_off,
            },
            "note_off",
        );
        Ok(())
    }

    /// Stop all playing voices.
    pub fn all_notes_off(&self, allow_tail_off: bool) -> Result<(), Error> {
        self.force_send_message(
            EngineMessage::AllNotesOff { allow_tail_off },
            "all_notes_off",
        );
        Ok(())
    }

    /// Replace the engine's parameter snapshot.
    pub fn set_parameters(&self, parameters: GranularParameters) -> Result<(), Error> {
        self.send_message(EngineMessage::SetParameters(parameters), "set_parameters")
    }

    /// Set a single parameter by id with a raw value, e.g. an `f32` or an enum value.
    pub fn set_parameter<V>(&self, id: FourCC, value: V) -> Result<(), Error>
    where
        V: std::any::Any + Send + Sync + 'static,
    {
        let value = Owned::new(
            &self.collector_handle,
            ParameterValueUpdate::Raw(Box::new(value)),
        );
        self.send_message(EngineMessage::SetParameter { id, value }, "set_parameter")
    }

    /// Set a single parameter by id with a normalized value in range `[0, 1]`.
    pub fn set_parameter_normalized(&self, id: FourCC, value: f32) -> Result<(), Error> {
        let value = Owned::new(
            &self.collector_handle,
            ParameterValueUpdate::Normalized(value),
        );
        self.send_message(
            EngineMessage::SetParameter { id, value },
            "set_parameter_normalized",
        )
    }

    /// Publish a new audio source. Replaced sources get dropped in [`Self::collect_garbage`].
    pub fn set_audio_source(&self, source: AudioSource) {
        log::debug!(
            "Publishing new audio source: {} channels, {} frames @ {} Hz",
            source.channel_count(),
            source.frame_count(),
            source.sample_rate()
        );
        self.source_cell.set(Shared::new(&self.collector_handle, source));
        self.collect_garbage();
    }

    /// Free replaced audio sources and parameter updates which are no longer used by the
    /// engine. Should be called regularly from a non real-time thread.
    pub fn collect_garbage(&self) {
        match self.collector.lock() {
            Ok(mut collector) => collector.collect(),
            Err(err) => log::warn!("Failed to lock garbage collector: {err}"),
        }
    }

    fn send_message(&self, message: EngineMessage, message_name: &str) -> Result<(), Error> {
        self.message_queue.push(message).map_err(|_| {
            log::warn!("Engine message queue is full: failed to send '{message_name}' message");
            Error::SendError(format!("engine message queue is full ({message_name})"))
        })
    }

    fn force_send_message(&self, message: EngineMessage, message_name: &str) {
        if self.message_queue.force_push(message).is_some() {
            log::warn!("Engine message queue is full: '{message_name}' replaced an older message");
        }
    }
}
