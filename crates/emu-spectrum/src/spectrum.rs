//! Top-level Spectrum machine.
//!
//! # Frame loop
//!
//! [`Spectrum::execute_cycle`] runs instructions until a stop condition
//! holds. Before each instruction it checks, in order: the cancellation
//! flag, the timeout, the termination point and the breakpoints. Then it
//! lets the interrupt device drive INT for the current frame tact and runs
//! one CPU cycle.
//!
//! A frame ends when the frame tact reaches the frame length (69,888 on
//! 48K). The last instruction usually overshoots by a few tacts; the excess
//! is carried into the next frame because the next frame starts exactly
//! one frame length after the previous one.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use emu_core::{Cpu, MasterClock, Observable, Tacts, Value};
use serde::{Deserialize, Serialize};
use sinclair_ula::{ContentionTable, InterruptDevice};
use tracing::{debug, trace};
use zilog_z80::{Z80, Z80State};

use crate::bus::SpectrumBus;
use crate::config::{MachineConfig, SpectrumModel};
use crate::error::{Result, SpectrumError};
use crate::keyboard::SpectrumKey;
use crate::memory::{Memory128K, Memory48K, SpectrumMemory};
use crate::psg::PsgRegisters;
use crate::pulse::PulseFrame;

/// How long [`Spectrum::execute_cycle`] keeps running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EmulationMode {
    /// Until cancelled, timed out, or stopped at a breakpoint.
    #[default]
    Continuous,
    /// Until the CPU is halted.
    UntilHalt,
    /// Until the current frame completes.
    UntilFrameEnds,
    /// Until PC reaches the termination point.
    UntilExecutionPoint,
}

/// Why [`Spectrum::execute_cycle`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionCompletionReason {
    None,
    Cancelled,
    Timeout,
    TerminationPointReached,
    BreakpointReached,
    Halted,
    FrameCompleted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOptions {
    pub mode: EmulationMode,
    /// Stop address for [`EmulationMode::UntilExecutionPoint`].
    pub termination_point: Option<u16>,
    /// Tact limit for this run. Zero means none.
    pub timeout_tacts: u64,
    /// Stop before the second instruction of the run, as if a breakpoint
    /// were set there.
    pub step_into: bool,
}

impl ExecutionOptions {
    #[must_use]
    pub fn new(mode: EmulationMode) -> Self {
        Self { mode, ..Self::default() }
    }

    #[must_use]
    pub fn until_execution_point(address: u16) -> Self {
        Self {
            mode: EmulationMode::UntilExecutionPoint,
            termination_point: Some(address),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, tacts: u64) -> Self {
        self.timeout_tacts = tacts;
        self
    }
}

/// Complete machine state for save states and debuggers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSnapshot {
    pub model: SpectrumModel,
    pub cpu: Z80State,
    /// Tacts elapsed in the current frame.
    pub frame_tact: u64,
    pub frame_count: u64,
    pub interrupt_count: u64,
    pub interrupt_raised: bool,
    pub interrupt_revoked: bool,
    /// Last value written to port $FE.
    pub port_fe: u8,
    pub bank_register: u8,
    pub psg: Option<PsgRegisters>,
    /// All RAM in bank order, base64 in JSON.
    #[serde(with = "ram_base64")]
    pub ram: Vec<u8>,
}

mod ram_base64 {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ram: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(ram))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

/// ZX Spectrum machine.
pub struct Spectrum {
    config: MachineConfig,
    cpu: Z80,
    bus: SpectrumBus,
    interrupt: InterruptDevice,
    frame_tacts: u64,
    /// Completed frame counter.
    frame_count: u64,
    breakpoints: BTreeSet<u16>,
    beeper_frame: PulseFrame,
    mic_frame: PulseFrame,
    last_reason: ExecutionCompletionReason,
}

impl Spectrum {
    /// Build a machine from `config` and a ROM image of the model's size.
    pub fn new(config: MachineConfig, rom: &[u8]) -> Result<Self> {
        config.validate()?;

        let memory: Box<dyn SpectrumMemory> = match config.model {
            SpectrumModel::Spectrum48 => Box::new(Memory48K::new(rom)?),
            SpectrumModel::Spectrum128 => Box::new(Memory128K::new(rom)?),
        };
        let mut bus = SpectrumBus::new(memory, ContentionTable::new(&config.screen));
        if config.model == SpectrumModel::Spectrum128 {
            bus.enable_psg();
        }

        debug!(model = config.model.name(), "machine created");
        Ok(Self {
            interrupt: InterruptDevice::new(config.interrupt_tact),
            frame_tacts: u64::from(config.screen.frame_tacts()),
            config,
            cpu: Z80::new(),
            bus,
            frame_count: 0,
            breakpoints: BTreeSet::new(),
            beeper_frame: PulseFrame::default(),
            mic_frame: PulseFrame::default(),
            last_reason: ExecutionCompletionReason::None,
        })
    }

    /// Run until one of the stop conditions of `options` holds, or `cancel`
    /// is set. Cancellation is only observed between instructions.
    pub fn execute_cycle(
        &mut self,
        options: &ExecutionOptions,
        cancel: &AtomicBool,
    ) -> ExecutionCompletionReason {
        let run_start = self.cpu.tacts();
        let mut first_instruction = true;

        let reason = loop {
            if cancel.load(Ordering::Relaxed) {
                break ExecutionCompletionReason::Cancelled;
            }

            if options.timeout_tacts > 0
                && self.cpu.tacts().since(run_start) >= options.timeout_tacts
            {
                break ExecutionCompletionReason::Timeout;
            }

            let pc = self.cpu.pc();
            if options.mode == EmulationMode::UntilExecutionPoint
                && options.termination_point == Some(pc)
            {
                break ExecutionCompletionReason::TerminationPointReached;
            }

            // The first instruction is exempt so a run can resume from the
            // breakpoint it stopped at.
            if !first_instruction && (options.step_into || self.breakpoints.contains(&pc)) {
                debug!(pc, "breakpoint reached");
                break ExecutionCompletionReason::BreakpointReached;
            }
            first_instruction = false;

            let frame_tact = self.bus.frame_tact(self.cpu.tacts());
            self.interrupt.check_for_interrupt(&mut self.cpu, frame_tact);
            self.cpu.execute_cpu_cycle(&mut self.bus);

            if self.bus.frame_tact(self.cpu.tacts()) >= self.frame_tacts {
                self.complete_frame();
                if options.mode == EmulationMode::UntilFrameEnds {
                    break ExecutionCompletionReason::FrameCompleted;
                }
            }

            if options.mode == EmulationMode::UntilHalt && self.cpu.is_halted() {
                break ExecutionCompletionReason::Halted;
            }
        };

        if reason != ExecutionCompletionReason::FrameCompleted {
            debug!(?reason, pc = self.cpu.pc(), tacts = %self.cpu.tacts(), "execution stopped");
        }
        self.last_reason = reason;
        reason
    }

    /// Run exactly one frame.
    pub fn run_frame(&mut self) -> ExecutionCompletionReason {
        let options = ExecutionOptions::new(EmulationMode::UntilFrameEnds);
        self.execute_cycle(&options, &AtomicBool::new(false))
    }

    fn complete_frame(&mut self) {
        let frame_end = self.bus.frame_start() + self.frame_tacts;
        self.beeper_frame = self.bus.beeper.end_frame(frame_end);
        self.mic_frame = self.bus.mic.end_frame(frame_end);
        self.bus.set_frame_start(frame_end);
        self.interrupt.start_new_frame();
        self.frame_count += 1;
        trace!(
            frame = self.frame_count,
            overflow = self.bus.frame_tact(self.cpu.tacts()),
            "frame completed"
        );
    }

    /// Reset the CPU through its reset signal, then the devices. A new frame
    /// starts at the current tact. RAM survives.
    pub fn reset(&mut self) {
        self.cpu.set_reset_signal();
        // The reset signal costs no tacts and fetches nothing.
        self.cpu.execute_cpu_cycle(&mut self.bus);
        let now = self.cpu.tacts();
        self.bus.reset(now);
        self.interrupt.reset();
        self.beeper_frame = PulseFrame::default();
        self.mic_frame = PulseFrame::default();
        self.last_reason = ExecutionCompletionReason::None;
        debug!(tacts = %now, "machine reset");
    }

    /// Wall-clock length of one frame, for real-time pacing.
    #[must_use]
    pub fn frame_duration(&self) -> Duration {
        MasterClock::new(u64::from(self.config.clock_hz)).duration_of(self.frame_tacts)
    }

    // =========================================================================
    // Debugger surface
    // =========================================================================

    pub fn add_breakpoint(&mut self, address: u16) {
        self.breakpoints.insert(address);
    }

    pub fn remove_breakpoint(&mut self, address: u16) -> bool {
        self.breakpoints.remove(&address)
    }

    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    #[must_use]
    pub fn breakpoints(&self) -> &BTreeSet<u16> {
        &self.breakpoints
    }

    /// Move PC without executing anything.
    pub fn set_pc(&mut self, pc: u16) {
        let mut state = self.cpu.snapshot();
        state.registers.pc = pc;
        self.cpu.restore(&state);
    }

    /// Copy bytes into memory through the current paging, ROM included.
    pub fn load(&mut self, address: u16, data: &[u8]) {
        self.bus.memory.load(address, data);
    }

    pub fn request_nmi(&mut self) {
        self.cpu.request_nmi();
    }

    pub fn press_key(&mut self, key: SpectrumKey) {
        self.bus.keyboard.press(key);
    }

    pub fn release_key(&mut self, key: SpectrumKey) {
        self.bus.keyboard.release(key);
    }

    pub fn release_all_keys(&mut self) {
        self.bus.keyboard.release_all();
    }

    /// Drive the EAR input from a tape signal at the current tact, or
    /// release it with `None`.
    pub fn set_tape_ear(&mut self, level: Option<bool>) {
        self.bus.set_tape_ear(level, self.cpu.tacts());
    }

    // =========================================================================
    // Observation
    // =========================================================================

    #[must_use]
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    #[must_use]
    pub fn cpu(&self) -> &Z80 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Z80 {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &SpectrumBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut SpectrumBus {
        &mut self.bus
    }

    #[must_use]
    pub fn interrupt(&self) -> &InterruptDevice {
        &self.interrupt
    }

    #[must_use]
    pub fn tacts(&self) -> Tacts {
        self.cpu.tacts()
    }

    #[must_use]
    pub fn frame_tacts(&self) -> u64 {
        self.frame_tacts
    }

    /// Tacts elapsed in the current frame.
    #[must_use]
    pub fn frame_tact(&self) -> u64 {
        self.bus.frame_tact(self.cpu.tacts())
    }

    /// Completed frames since construction.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    #[must_use]
    pub fn last_reason(&self) -> ExecutionCompletionReason {
        self.last_reason
    }

    /// Beeper pulses of the last completed frame.
    #[must_use]
    pub fn beeper_frame(&self) -> &PulseFrame {
        &self.beeper_frame
    }

    /// MIC pulses of the last completed frame.
    #[must_use]
    pub fn mic_frame(&self) -> &PulseFrame {
        &self.mic_frame
    }

    /// Beeper output of the last completed frame, one sample per
    /// `tacts_per_sample`.
    #[must_use]
    pub fn beeper_samples(&self) -> Vec<f32> {
        self.beeper_frame.render_samples(self.frame_tacts, self.config.tacts_per_sample)
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    #[must_use]
    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            model: self.config.model,
            cpu: self.cpu.snapshot(),
            frame_tact: self.frame_tact(),
            frame_count: self.frame_count,
            interrupt_count: self.interrupt.frame_count(),
            interrupt_raised: self.interrupt.is_raised(),
            interrupt_revoked: self.interrupt.is_revoked(),
            port_fe: self.bus.last_fe_write(),
            bank_register: self.bus.memory.bank_register(),
            psg: self.bus.psg.clone(),
            ram: self.bus.memory.ram_image(),
        }
    }

    /// Restore a snapshot taken from a machine of the same model. Pending
    /// pulses are dropped.
    pub fn restore(&mut self, snapshot: &MachineSnapshot) -> Result<()> {
        if snapshot.model != self.config.model {
            return Err(SpectrumError::SnapshotMismatch {
                snapshot: snapshot.model.name(),
                machine: self.config.model.name(),
            });
        }

        self.bus.memory.restore_ram_image(&snapshot.ram, snapshot.bank_register)?;
        self.cpu.restore(&snapshot.cpu);

        let now = self.cpu.tacts();
        let frame_start = now.get().saturating_sub(snapshot.frame_tact);
        self.bus.reset_pulses(now);
        self.bus.set_tape_ear(None, now);
        self.bus.set_frame_start(frame_start);
        self.bus.set_last_fe_write(snapshot.port_fe);
        if self.bus.psg.is_some() {
            self.bus.psg.clone_from(&snapshot.psg);
        }

        self.interrupt.set_frame_count(snapshot.interrupt_count);
        self.interrupt.restore(snapshot.interrupt_raised, snapshot.interrupt_revoked);
        self.frame_count = snapshot.frame_count;
        self.beeper_frame = PulseFrame::default();
        self.mic_frame = PulseFrame::default();
        debug!(tacts = %now, "snapshot restored");
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    pub fn restore_json(&mut self, json: &str) -> Result<()> {
        let snapshot: MachineSnapshot = serde_json::from_str(json)?;
        self.restore(&snapshot)
    }

    /// Build a machine from `config` and `rom`, then restore a JSON snapshot.
    pub fn from_json(config: MachineConfig, rom: &[u8], json: &str) -> Result<Self> {
        let mut machine = Self::new(config, rom)?;
        machine.restore_json(json)?;
        Ok(machine)
    }
}

fn parse_address(text: &str) -> Option<u16> {
    if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .or_else(|| text.strip_prefix('$'))
    {
        u16::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

impl Observable for Spectrum {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("cpu.") {
            self.cpu.query(rest)
        } else if let Some(rest) = path.strip_prefix("ula.") {
            let value = match rest {
                "frame_tact" => self.frame_tact().into(),
                "frame_count" => self.frame_count.into(),
                "border" => self.bus.border().into(),
                "line" => self.config.screen.position(self.frame_tact()).0.into(),
                "tact_in_line" => self.config.screen.position(self.frame_tact()).1.into(),
                "interrupt.raised" => self.interrupt.is_raised().into(),
                "interrupt.revoked" => self.interrupt.is_revoked().into(),
                "interrupt.count" => self.interrupt.frame_count().into(),
                _ => return None,
            };
            Some(value)
        } else if let Some(rest) = path.strip_prefix("memory.") {
            match rest {
                "bank_register" => Some(self.bus.memory.bank_register().into()),
                "screen_bank" => Some(self.bus.memory.screen_bank().into()),
                _ => parse_address(rest).map(|a| Value::U8(self.bus.memory.read(a))),
            }
        } else {
            match path {
                "model" => Some(self.config.model.name().into()),
                "tacts" => Some(self.cpu.tacts().get().into()),
                _ => None,
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "cpu.<z80_paths>",
            "ula.frame_tact",
            "ula.frame_count",
            "ula.border",
            "ula.line",
            "ula.tact_in_line",
            "ula.interrupt.raised",
            "ula.interrupt.revoked",
            "ula.interrupt.count",
            "memory.<address>",
            "memory.bank_register",
            "memory.screen_bank",
            "model",
            "tacts",
        ]
    }
}
