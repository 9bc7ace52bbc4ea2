use holo_core::{HoloError, HoloResult};
use wgpu::{Adapter, AdapterInfo, Device, Instance, Queue};

/// Adapter selection knobs for the offscreen context.
#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub backends: wgpu::Backends,
    pub power_preference: wgpu::PowerPreference,
    /// Force the software (fallback) adapter, e.g. on headless CI machines.
    pub force_fallback_adapter: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
        }
    }
}

impl ContextOptions {
    /// Defaults, overridden by `WGPU_BACKEND` and `WGPU_POWER_PREF` when set.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backends: wgpu::util::backend_bits_from_env().unwrap_or(defaults.backends),
            power_preference: wgpu::util::power_preference_from_env()
                .unwrap_or(defaults.power_preference),
            force_fallback_adapter: false,
        }
    }
}

struct GpuHandles {
    _instance: Instance,
    _adapter: Adapter,
    device: Device,
    queue: Queue,
}

/// An offscreen (windowless) GPU context.
///
/// Every GPU object the renderer creates borrows the context it came from, so
/// none of them can outlive it. After [`GraphicsContext::release`] every
/// operation fails with [`HoloError::UseAfterRelease`].
pub struct GraphicsContext {
    handles: Option<GpuHandles>,
    info: AdapterInfo,
    limits: wgpu::Limits,
}

impl GraphicsContext {
    /// Create a context with adapter options taken from the environment.
    pub fn create() -> HoloResult<Self> {
        Self::create_with(&ContextOptions::from_env())
    }

    pub fn create_with(options: &ContextOptions) -> HoloResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: options.backends,
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: options.power_preference,
            compatible_surface: None, // Headless rendering
            force_fallback_adapter: options.force_fallback_adapter,
        }))
        .ok_or_else(|| {
            HoloError::ContextCreation(format!(
                "no compatible GPU adapter found (backends: {:?}); a working Vulkan, Metal, DX12 or GL driver is required",
                options.backends
            ))
        })?;

        let info = adapter.get_info();
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Holo Offscreen Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
            },
            None,
        ))
        .map_err(|e| {
            HoloError::ContextCreation(format!("adapter '{}' refused a device: {}", info.name, e))
        })?;

        // Everything that can fail is wrapped in an error scope; anything that
        // still escapes is logged instead of aborting the process.
        device.on_uncaptured_error(Box::new(|e| {
            tracing::warn!("Uncaptured GPU error: {}", e);
        }));

        let limits = device.limits();
        tracing::info!(
            "Offscreen context on '{}' ({:?}, {:?}), max texture {}px",
            info.name,
            info.backend,
            info.device_type,
            limits.max_texture_dimension_2d
        );

        Ok(Self {
            handles: Some(GpuHandles {
                _instance: instance,
                _adapter: adapter,
                device,
                queue,
            }),
            info,
            limits,
        })
    }

    fn handles(&self, operation: &'static str) -> HoloResult<&GpuHandles> {
        self.handles
            .as_ref()
            .ok_or(HoloError::UseAfterRelease { operation })
    }

    pub fn device(&self) -> HoloResult<&Device> {
        self.handles("device").map(|h| &h.device)
    }

    pub fn queue(&self) -> HoloResult<&Queue> {
        self.handles("queue").map(|h| &h.queue)
    }

    pub fn adapter_info(&self) -> &AdapterInfo {
        &self.info
    }

    pub fn max_texture_dimension(&self) -> u32 {
        self.limits.max_texture_dimension_2d
    }

    /// Reject a 2D extent the device cannot allocate.
    pub fn check_extent(&self, what: &str, width: u32, height: u32) -> HoloResult<()> {
        let max = self.max_texture_dimension();
        if width == 0 || height == 0 || width > max || height > max {
            return Err(HoloError::Gpu(format!(
                "{what} size {width}x{height} is outside the device range 1..={max}"
            )));
        }
        Ok(())
    }

    pub fn is_released(&self) -> bool {
        self.handles.is_none()
    }

    /// Run `f` inside validation and out-of-memory error scopes and return the
    /// first error the device reported for it.
    pub fn capture_errors<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&Device, &Queue) -> T,
    ) -> HoloResult<(T, Option<wgpu::Error>)> {
        let handles = self.handles(operation)?;
        let device = &handles.device;

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(device, &handles.queue);
        let validation = pollster::block_on(device.pop_error_scope());
        let oom = pollster::block_on(device.pop_error_scope());

        Ok((value, validation.or(oom)))
    }

    /// Wait for outstanding GPU work, then destroy the device. Idempotent.
    pub fn release(&mut self) {
        if let Some(handles) = self.handles.take() {
            let _ = handles.device.poll(wgpu::Maintain::Wait);
            handles.device.destroy();
            tracing::debug!("Released offscreen context on '{}'", self.info.name);
        }
    }
}

impl Drop for GraphicsContext {
    fn drop(&mut self) {
        self.release();
    }
}

/// Source of graphics contexts for the renderer.
///
/// The renderer asks for exactly one context per invocation, after all
/// inputs have been validated and decoded.
pub trait ContextProvider {
    fn create_context(&self) -> HoloResult<GraphicsContext>;
}

/// Creates a fresh headless wgpu context on every call.
#[derive(Debug, Clone, Default)]
pub struct HeadlessProvider {
    pub options: ContextOptions,
}

impl HeadlessProvider {
    pub fn new(options: ContextOptions) -> Self {
        Self { options }
    }

    pub fn from_env() -> Self {
        Self::new(ContextOptions::from_env())
    }
}

impl ContextProvider for HeadlessProvider {
    fn create_context(&self) -> HoloResult<GraphicsContext> {
        GraphicsContext::create_with(&self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_headless_friendly() {
        let opts = ContextOptions::default();
        assert_eq!(opts.backends, wgpu::Backends::all());
        assert!(!opts.force_fallback_adapter);
    }

    #[test]
    fn test_release_is_idempotent_and_blocks_use() {
        let Ok(mut ctx) = GraphicsContext::create() else {
            eprintln!("skipping: no GPU adapter available");
            return;
        };
        assert!(ctx.device().is_ok());
        ctx.release();
        ctx.release();
        assert!(ctx.is_released());
        assert!(matches!(
            ctx.device(),
            Err(HoloError::UseAfterRelease { operation: "device" })
        ));
        assert!(matches!(
            ctx.capture_errors("draw", |_, _| ()),
            Err(HoloError::UseAfterRelease { operation: "draw" })
        ));
    }

    #[test]
    fn test_check_extent_bounds() {
        let Ok(ctx) = GraphicsContext::create() else {
            eprintln!("skipping: no GPU adapter available");
            return;
        };
        let max = ctx.max_texture_dimension();
        assert!(ctx.check_extent("output", 1, 1).is_ok());
        assert!(ctx.check_extent("output", max, 1).is_ok());
        assert!(ctx.check_extent("output", 0, 16).is_err());
        assert!(ctx.check_extent("output", max + 1, 16).is_err());
    }
}
