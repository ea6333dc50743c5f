use crate::{
    interrupts::{mutex_irq::hold_interrupts, IntrLevel},
    mem::FrameAllocator,
    swapping::{ConfigError, PagingConfig, PagingStats, ProcessPaging, SwapFile},
    sync::mutex::Mutex,
};
use alloc::{boxed::Box, collections::BTreeMap, string::String, vec::Vec};
use core::sync::atomic::{AtomicU16, Ordering};
use log::info;

pub type Pid = u16;
pub type AtomicPid = AtomicU16;

pub struct Process {
    pid: Pid,
    name: String,
    /// Committed size of the user address space, in bytes. Faults at or past
    /// it are illegal.
    size: usize,
    killed: bool,
    paging: ProcessPaging,
}

impl Process {
    pub fn new(
        pid: Pid,
        name: impl Into<String>,
        size: usize,
        config: PagingConfig,
        swap_file: Box<dyn SwapFile + Send>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            pid,
            name: name.into(),
            size,
            killed: false,
            paging: ProcessPaging::new(config, swap_file)?,
        })
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Grow or shrink the committed size, as `sbrk` would.
    pub fn set_size(&mut self, size: usize) {
        self.size = size;
    }

    pub fn paging(&self) -> &ProcessPaging {
        &self.paging
    }

    pub fn paging_mut(&mut self) -> &mut ProcessPaging {
        &mut self.paging
    }

    /// Mark the process for death. It keeps its memory until it is reaped.
    pub fn terminate(&mut self) {
        self.killed = true;
    }

    pub fn is_killed(&self) -> bool {
        self.killed
    }

    /// Tear the process down, returning every frame and swap slot it holds.
    pub fn exit<A: FrameAllocator>(mut self, frames: &Mutex<A>) -> PagingStats {
        let _intr = hold_interrupts(IntrLevel::IntrOff);
        info!("pid {} ({}) exiting: {}", self.pid, self.name, self.paging);
        self.paging.release(&mut *frames.lock());
        self.paging.stats()
    }
}

#[derive(Default)]
pub struct ProcessTable {
    content: BTreeMap<Pid, Process>,
}

pub struct ProcessState {
    pub table: ProcessTable,
    next_pid: AtomicPid,
}

pub fn create_process_state() -> ProcessState {
    ProcessState {
        table: ProcessTable::default(),
        next_pid: AtomicPid::new(1),
    }
}

impl ProcessState {
    pub fn allocate_pid(&self) -> Pid {
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        if pid == 0 {
            panic!("PID overflow");
        }
        pid
    }
}

impl ProcessTable {
    pub fn add(&mut self, process: Process) {
        let pid = process.pid();
        assert!(
            !self.content.contains_key(&pid),
            "process with pid {pid} already added to process table."
        );
        self.content.insert(pid, process);
    }

    pub fn remove(&mut self, pid: Pid) -> Option<Process> {
        self.content.remove(&pid)
    }

    pub fn get(&self, pid: Pid) -> Option<&Process> {
        self.content.get(&pid)
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Process> {
        self.content.get_mut(&pid)
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Remove and tear down every killed process. Returns their pids.
    pub fn reap<A: FrameAllocator>(&mut self, frames: &Mutex<A>) -> Vec<Pid> {
        let killed: Vec<Pid> = self
            .content
            .values()
            .filter(|process| process.is_killed())
            .map(Process::pid)
            .collect();
        for pid in &killed {
            if let Some(process) = self.content.remove(pid) {
                process.exit(frames);
            }
        }
        killed
    }
}
