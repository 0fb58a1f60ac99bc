//! Display-free implementations of the host collaborators.
//!
//! [`RecordingContext`] logs every graphics command and keeps buffer contents
//! in memory, [`HeadlessSurface`] is a plain width/height pair and
//! [`ManualScheduler`] hands out frame handles that only fire when the caller
//! says so. Together they drive a full [`RenderLoop`](crate::render_loop::RenderLoop)
//! without a GPU, which is how the tests and the CLI's `--headless-frames`
//! mode run.
//!
//! A [`SurfaceLog`] taken from the surface before it moves into a loop keeps
//! recording what the loop does to the surface and its context, including
//! the cleanup after a failed construction.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use shimmer::headless::{HeadlessSurface, ManualScheduler};
//!
//! let surface = HeadlessSurface::new(800, 600);
//! let mut scheduler = ManualScheduler::new();
//! scheduler.advance(Duration::from_millis(16));
//! ```

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Duration;

use crate::error::{GpuError, SceneError};
use crate::gpu::{
    BlendFunc, BufferId, BufferKind, Capability, DrawCall, DrawUniforms, GraphicsContext, ProgramDesc,
    ProgramId,
};
use crate::host::{FrameHandle, FrameScheduler, Surface};

/// A command issued against a [`RecordingContext`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Viewport { x: i32, y: i32, width: u32, height: u32 },
    Clear([f32; 4]),
    Enable(Capability),
    Disable(Capability),
    BlendFunc(BlendFunc),
    CreateBuffer { id: BufferId, kind: BufferKind, len: usize },
    WriteBuffer { id: BufferId, offset: u64, len: usize },
    DeleteBuffer(BufferId),
    CreateProgram { id: ProgramId, label: String },
    DeleteProgram(ProgramId),
    Draw {
        program: ProgramId,
        index_count: u32,
        instance_count: u32,
        uniforms: DrawUniforms,
    },
    Present,
    LoseContext,
}

/// Shared record of the commands and resizes a [`HeadlessSurface`] saw.
///
/// Every clone reads the same record, so it stays readable after the surface
/// and its context have moved into a render loop or been dropped.
#[derive(Debug, Clone, Default)]
pub struct SurfaceLog(Rc<RefCell<LogState>>);

#[derive(Debug, Default)]
struct LogState {
    commands: Vec<Command>,
    sizes: Vec<(u32, u32)>,
}

impl SurfaceLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands issued against every context created from the surface.
    pub fn commands(&self) -> Vec<Command> {
        self.0.borrow().commands.clone()
    }

    pub fn contains(&self, command: &Command) -> bool {
        self.0.borrow().commands.contains(command)
    }

    /// Sizes passed to [`Surface::set_size`], oldest first.
    pub fn sizes(&self) -> Vec<(u32, u32)> {
        self.0.borrow().sizes.clone()
    }

    pub fn last_size(&self) -> Option<(u32, u32)> {
        self.0.borrow().sizes.last().copied()
    }

    /// Buffers created and never passed to `delete_buffer`.
    ///
    /// Losing the context frees buffers without counting as a delete.
    pub fn live_buffers(&self) -> usize {
        let mut live = HashSet::new();
        for command in &self.0.borrow().commands {
            match command {
                Command::CreateBuffer { id, .. } => {
                    live.insert(*id);
                }
                Command::DeleteBuffer(id) => {
                    live.remove(id);
                }
                _ => {}
            }
        }
        live.len()
    }

    /// Programs created and never passed to `delete_program`.
    pub fn live_programs(&self) -> usize {
        let mut live = HashSet::new();
        for command in &self.0.borrow().commands {
            match command {
                Command::CreateProgram { id, .. } => {
                    live.insert(*id);
                }
                Command::DeleteProgram(id) => {
                    live.remove(id);
                }
                _ => {}
            }
        }
        live.len()
    }

    fn push_command(&self, command: Command) {
        self.0.borrow_mut().commands.push(command);
    }

    fn push_size(&self, size: (u32, u32)) {
        self.0.borrow_mut().sizes.push(size);
    }
}

/// Graphics context that records commands instead of drawing.
#[derive(Debug, Default)]
pub struct RecordingContext {
    commands: Vec<Command>,
    buffers: HashMap<BufferId, Vec<u8>>,
    programs: HashMap<ProgramId, String>,
    next_id: u32,
    lost: bool,
    log: Option<SurfaceLog>,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that also copies every command into `log`.
    pub fn with_log(log: SurfaceLog) -> Self {
        Self {
            log: Some(log),
            ..Self::default()
        }
    }

    /// Every command since creation or the last [`clear_commands`](Self::clear_commands).
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Current contents of a live buffer.
    pub fn buffer_data(&self, id: BufferId) -> Option<&[u8]> {
        self.buffers.get(&id).map(Vec::as_slice)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn is_lost(&self) -> bool {
        self.lost
    }

    /// Number of draw commands recorded.
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Draw { .. }))
            .count()
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn record(&mut self, command: Command) {
        if let Some(log) = &self.log {
            log.push_command(command.clone());
        }
        self.commands.push(command);
    }

    fn check_live(&self) -> Result<(), GpuError> {
        if self.lost {
            Err(GpuError::ContextLost)
        } else {
            Ok(())
        }
    }
}

impl GraphicsContext for RecordingContext {
    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.record(Command::Viewport { x, y, width, height });
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.record(Command::Clear(color));
    }

    fn enable(&mut self, capability: Capability) {
        self.record(Command::Enable(capability));
    }

    fn disable(&mut self, capability: Capability) {
        self.record(Command::Disable(capability));
    }

    fn blend_func_separate(&mut self, func: BlendFunc) {
        self.record(Command::BlendFunc(func));
    }

    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> Result<BufferId, GpuError> {
        self.check_live()?;
        let id = BufferId(self.next_id());
        self.buffers.insert(id, data.to_vec());
        self.record(Command::CreateBuffer { id, kind, len: data.len() });
        Ok(id)
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), GpuError> {
        self.check_live()?;
        let stored = self
            .buffers
            .get_mut(&buffer)
            .ok_or(GpuError::UnknownBuffer(buffer))?;
        let size = stored.len() as u64;
        let end = offset + data.len() as u64;
        if end > size {
            return Err(GpuError::BufferOverflow {
                buffer,
                offset,
                len: data.len(),
                size,
            });
        }
        stored[offset as usize..end as usize].copy_from_slice(data);
        self.record(Command::WriteBuffer {
            id: buffer,
            offset,
            len: data.len(),
        });
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if self.buffers.remove(&buffer).is_some() {
            self.record(Command::DeleteBuffer(buffer));
        }
    }

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId, GpuError> {
        self.check_live()?;
        let id = ProgramId(self.next_id());
        self.programs.insert(id, desc.label.to_string());
        self.record(Command::CreateProgram {
            id,
            label: desc.label.to_string(),
        });
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) {
        if self.programs.remove(&program).is_some() {
            self.record(Command::DeleteProgram(program));
        }
    }

    fn draw(&mut self, call: &DrawCall) -> Result<(), GpuError> {
        self.check_live()?;
        if !self.programs.contains_key(&call.program) {
            return Err(GpuError::UnknownProgram(call.program));
        }
        for id in [call.mesh.vertices, call.mesh.indices]
            .into_iter()
            .chain(call.instances)
        {
            if !self.buffers.contains_key(&id) {
                return Err(GpuError::UnknownBuffer(id));
            }
        }
        self.record(Command::Draw {
            program: call.program,
            index_count: call.mesh.index_count,
            instance_count: call.instance_count,
            uniforms: call.uniforms,
        });
        Ok(())
    }

    fn present(&mut self) -> Result<(), GpuError> {
        self.check_live()?;
        self.record(Command::Present);
        Ok(())
    }

    fn lose_context(&mut self) -> bool {
        self.buffers.clear();
        self.programs.clear();
        self.lost = true;
        self.record(Command::LoseContext);
        true
    }
}

/// In-memory drawable surface.
#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    size: (u32, u32),
    client_size: (u32, u32),
    window_size: (u32, u32),
    context_available: bool,
    log: SurfaceLog,
}

impl HeadlessSurface {
    /// Surface laid out at `width` × `height` inside a window of the same size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            client_size: (width, height),
            window_size: (width, height),
            context_available: true,
            log: SurfaceLog::new(),
        }
    }

    /// A surface whose `create_context` always fails.
    pub fn without_context(width: u32, height: u32) -> Self {
        Self {
            context_available: false,
            ..Self::new(width, height)
        }
    }

    /// Resize the host window; the render loop picks it up next frame.
    pub fn resize_window(&mut self, width: u32, height: u32) {
        self.window_size = (width, height);
        self.client_size = (width, height);
    }

    /// Handle on this surface's record; clones share it.
    pub fn log(&self) -> SurfaceLog {
        self.log.clone()
    }
}

impl Surface for HeadlessSurface {
    type Context = RecordingContext;

    fn create_context(&mut self) -> Result<RecordingContext, SceneError> {
        if self.context_available {
            Ok(RecordingContext::with_log(self.log.clone()))
        } else {
            Err(SceneError::NoContext("headless surface has no context".into()))
        }
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.log.push_size(self.size);
    }

    fn client_size(&self) -> (u32, u32) {
        self.client_size
    }

    fn window_size(&self) -> (u32, u32) {
        self.window_size
    }
}

/// Scheduler driven by hand.
///
/// Frames never fire on their own; the test calls
/// [`RenderLoop::on_frame`](crate::render_loop::RenderLoop::on_frame) after
/// [`advance`](Self::advance) to simulate a display refresh.
#[derive(Debug, Default, Clone)]
pub struct ManualScheduler {
    now: Duration,
    next_handle: u64,
    pending: Option<FrameHandle>,
    requested: Vec<FrameHandle>,
    cancelled: Vec<FrameHandle>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward.
    pub fn advance(&mut self, by: Duration) {
        self.now += by;
    }

    /// The most recent request that has not been cancelled.
    pub fn pending(&self) -> Option<FrameHandle> {
        self.pending
    }

    /// Every handle ever requested, in order.
    pub fn requested(&self) -> &[FrameHandle] {
        &self.requested
    }

    pub fn cancelled(&self) -> &[FrameHandle] {
        &self.cancelled
    }
}

impl FrameScheduler for ManualScheduler {
    fn now(&self) -> Duration {
        self.now
    }

    fn request_frame(&mut self) -> FrameHandle {
        self.next_handle += 1;
        let handle = FrameHandle(self.next_handle);
        self.requested.push(handle);
        self.pending = Some(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.cancelled.push(handle);
        if self.pending == Some(handle) {
            self.pending = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::Mesh;

    #[test]
    fn test_write_buffer_bounds() {
        let mut gfx = RecordingContext::new();
        let id = gfx.create_buffer(BufferKind::Instance, &[0; 8]).unwrap();

        gfx.write_buffer(id, 4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(gfx.buffer_data(id).unwrap(), &[0, 0, 0, 0, 1, 2, 3, 4]);

        let err = gfx.write_buffer(id, 6, &[0; 4]).unwrap_err();
        assert!(matches!(err, GpuError::BufferOverflow { size: 8, .. }));
    }

    #[test]
    fn test_draw_checks_handles() {
        let mut gfx = RecordingContext::new();
        let mesh = Mesh::quad(1.0).upload(&mut gfx).unwrap();
        let call = DrawCall {
            program: ProgramId(99),
            mesh,
            instances: None,
            instance_count: 1,
            uniforms: bytemuck::Zeroable::zeroed(),
        };
        assert!(matches!(gfx.draw(&call), Err(GpuError::UnknownProgram(_))));
    }

    #[test]
    fn test_lost_context_rejects_work() {
        let mut gfx = RecordingContext::new();
        gfx.create_buffer(BufferKind::Vertex, &[0; 4]).unwrap();
        assert!(gfx.lose_context());
        assert!(gfx.is_lost());
        assert_eq!(gfx.live_buffers(), 0);
        assert!(matches!(gfx.present(), Err(GpuError::ContextLost)));
    }

    #[test]
    fn test_manual_scheduler() {
        let mut scheduler = ManualScheduler::new();
        let first = scheduler.request_frame();
        let second = scheduler.request_frame();
        assert_ne!(first, second);
        assert_eq!(scheduler.pending(), Some(second));

        scheduler.cancel_frame(second);
        assert_eq!(scheduler.pending(), None);
        assert_eq!(scheduler.requested().len(), 2);

        scheduler.advance(Duration::from_millis(16));
        assert_eq!(scheduler.now(), Duration::from_millis(16));
    }

    #[test]
    fn test_log_outlives_surface() {
        let mut surface = HeadlessSurface::new(10, 10);
        let log = surface.log();
        {
            let mut gfx = surface.create_context().unwrap();
            let buffer = gfx.create_buffer(BufferKind::Vertex, &[0; 4]).unwrap();
            gfx.create_buffer(BufferKind::Index, &[0; 2]).unwrap();
            gfx.delete_buffer(buffer);
            gfx.lose_context();
        }
        surface.set_size(1, 1);
        drop(surface);

        assert_eq!(log.live_buffers(), 1);
        assert_eq!(log.live_programs(), 0);
        assert!(log.contains(&Command::LoseContext));
        assert_eq!(log.sizes(), vec![(1, 1)]);
    }

    #[test]
    fn test_surface_without_context() {
        let mut surface = HeadlessSurface::without_context(10, 10);
        assert!(matches!(surface.create_context(), Err(SceneError::NoContext(_))));
    }
}
