// src/native.rs
// Binding to `libgpumonitor`, loaded at run time.
//
// The library exports four C functions around an opaque context:
//
//     GpuContext *gpu_monitor_init(void);
//     void        gpu_monitor_cleanup(GpuContext *ctx);
//     int         gpu_monitor_get_device_count(GpuContext *ctx);
//     int         gpu_monitor_get_temperatures(GpuContext *ctx, int index, GpuTemperatures *out);
//
// `NativeMonitor` owns one context and releases it on drop, before the
// library itself is unloaded.

use std::ffi::{c_char, c_int, c_void};
use std::path::Path;
use std::ptr::NonNull;

use libloading::Library;

use crate::error::{MonitorError, Result};
use crate::globals::{
    ERROR_MESSAGE_LEN, SYM_CLEANUP, SYM_DEVICE_COUNT, SYM_INIT, SYM_TEMPERATURES,
};
use crate::sensor::{TemperatureSource, Temperatures};

/// Mirror of the library's `GpuTemperatures` record.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct GpuTemperatures {
    pub gpu_temp: u32,
    pub junction_temp: u32,
    pub vram_temp: u32,
    pub error_message: [c_char; ERROR_MESSAGE_LEN],
}

impl GpuTemperatures {
    pub fn zeroed() -> Self {
        Self {
            gpu_temp: 0,
            junction_temp: 0,
            vram_temp: 0,
            error_message: [0; ERROR_MESSAGE_LEN],
        }
    }

    /// Text up to the first NUL. The buffer may be unterminated or hold
    /// bytes that are not UTF-8.
    pub fn error_message(&self) -> String {
        let bytes: Vec<u8> = self
            .error_message
            .iter()
            .map(|&c| c as u8)
            .take_while(|&b| b != 0)
            .collect();
        String::from_utf8_lossy(&bytes).trim().to_string()
    }

    pub fn temperatures(&self) -> Temperatures {
        Temperatures {
            core: self.gpu_temp,
            junction: self.junction_temp,
            vram: self.vram_temp,
        }
    }
}

type InitFn = unsafe extern "C" fn() -> *mut c_void;
type CleanupFn = unsafe extern "C" fn(*mut c_void);
type DeviceCountFn = unsafe extern "C" fn(*mut c_void) -> c_int;
type TemperaturesFn = unsafe extern "C" fn(*mut c_void, c_int, *mut GpuTemperatures) -> c_int;

/// Resolved entry points. The function pointers stay valid for as long as
/// `_library` is loaded.
struct Api {
    init: InitFn,
    cleanup: CleanupFn,
    device_count: DeviceCountFn,
    temperatures: TemperaturesFn,
    _library: Option<Library>,
}

impl Api {
    fn load(path: &Path) -> Result<Self> {
        let path_str = path.display().to_string();
        tracing::debug!("loading {}", path_str);

        // SAFETY: loading runs the library's initializers; libgpumonitor has
        // none with preconditions beyond being on a Linux host.
        let library = unsafe { Library::new(path) }.map_err(|reason| {
            MonitorError::LibraryLoad {
                path: path_str.clone(),
                reason,
            }
        })?;

        // SAFETY: the types match the exported C prototypes listed above.
        unsafe {
            Ok(Self {
                init: symbol(&library, &path_str, SYM_INIT)?,
                cleanup: symbol(&library, &path_str, SYM_CLEANUP)?,
                device_count: symbol(&library, &path_str, SYM_DEVICE_COUNT)?,
                temperatures: symbol(&library, &path_str, SYM_TEMPERATURES)?,
                _library: Some(library),
            })
        }
    }
}

unsafe fn symbol<T: Copy>(library: &Library, path: &str, name: &'static str) -> Result<T> {
    library
        .get::<T>(name.as_bytes())
        .map(|sym| *sym)
        .map_err(|reason| MonitorError::MissingSymbol {
            symbol: name,
            path: path.to_string(),
            reason,
        })
}

/// An initialized monitoring context.
pub struct NativeMonitor {
    ctx: NonNull<c_void>,
    device_count: u32,
    api: Api,
}

// SAFETY: the context is only ever used by one thread at a time; it is moved
// into the polling thread and back, never shared.
unsafe impl Send for NativeMonitor {}

impl NativeMonitor {
    /// Loads the library at `path`, initializes a context and reads the
    /// device count.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let api = Api::load(path.as_ref())?;
        Self::from_api(api)
    }

    fn from_api(api: Api) -> Result<Self> {
        let ctx = NonNull::new(unsafe { (api.init)() }).ok_or(MonitorError::InitFailed)?;
        // Built before the count check so a bad count still cleans up.
        let mut monitor = Self {
            ctx,
            device_count: 0,
            api,
        };

        let raw = unsafe { (monitor.api.device_count)(monitor.ctx.as_ptr()) };
        monitor.device_count = u32::try_from(raw).map_err(|_| {
            tracing::error!("library reported a device count of {}", raw);
            MonitorError::InitFailed
        })?;

        tracing::debug!("native context ready, {} device(s)", monitor.device_count);
        Ok(monitor)
    }
}

impl TemperatureSource for NativeMonitor {
    fn device_count(&self) -> u32 {
        self.device_count
    }

    fn temperatures(&mut self, device: u32) -> Result<Temperatures> {
        let index = match c_int::try_from(device) {
            Ok(index) if device < self.device_count => index,
            _ => {
                return Err(MonitorError::Query {
                    device,
                    message: format!("device index out of range (0..{})", self.device_count),
                })
            }
        };

        let mut out = GpuTemperatures::zeroed();
        let rc = unsafe { (self.api.temperatures)(self.ctx.as_ptr(), index, &mut out) };
        if rc != 0 {
            return Err(MonitorError::Query {
                device,
                message: out.error_message(),
            });
        }
        Ok(out.temperatures())
    }
}

impl Drop for NativeMonitor {
    fn drop(&mut self) {
        tracing::debug!("releasing native context");
        unsafe { (self.api.cleanup)(self.ctx.as_ptr()) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

    struct FakeCtx {
        count: c_int,
        cleanups: AtomicUsize,
    }

    fn leak_ctx(count: c_int) -> *mut c_void {
        Box::into_raw(Box::new(FakeCtx {
            count,
            cleanups: AtomicUsize::new(0),
        })) as *mut c_void
    }

    unsafe extern "C" fn init_two() -> *mut c_void {
        leak_ctx(2)
    }

    static NEGATIVE_CTX: AtomicPtr<c_void> = AtomicPtr::new(std::ptr::null_mut());

    unsafe extern "C" fn init_negative() -> *mut c_void {
        let ctx = leak_ctx(-1);
        NEGATIVE_CTX.store(ctx, Ordering::SeqCst);
        ctx
    }

    unsafe extern "C" fn init_null() -> *mut c_void {
        std::ptr::null_mut()
    }

    // Contexts are leaked so tests can inspect them after the drop.
    unsafe extern "C" fn cleanup(ctx: *mut c_void) {
        let ctx = &*(ctx as *const FakeCtx);
        ctx.cleanups.fetch_add(1, Ordering::SeqCst);
    }

    unsafe extern "C" fn device_count(ctx: *mut c_void) -> c_int {
        (*(ctx as *const FakeCtx)).count
    }

    unsafe extern "C" fn temperatures(
        _ctx: *mut c_void,
        index: c_int,
        out: *mut GpuTemperatures,
    ) -> c_int {
        let out = &mut *out;
        if index == 0 {
            out.gpu_temp = 55;
            out.junction_temp = 71;
            out.vram_temp = 64;
            return 0;
        }
        for (dst, src) in out.error_message.iter_mut().zip(b"sensor offline\0") {
            *dst = *src as c_char;
        }
        -1
    }

    fn fake_api(init: InitFn) -> Api {
        Api {
            init,
            cleanup,
            device_count,
            temperatures,
            _library: None,
        }
    }

    fn cleanups(ctx: *const FakeCtx) -> usize {
        unsafe { (*ctx).cleanups.load(Ordering::SeqCst) }
    }

    #[test]
    fn test_open_reads_device_count() {
        let monitor = NativeMonitor::from_api(fake_api(init_two)).unwrap();
        assert_eq!(monitor.device_count(), 2);
    }

    #[test]
    fn test_null_context_is_init_failure() {
        let err = NativeMonitor::from_api(fake_api(init_null)).err().unwrap();
        assert!(matches!(err, MonitorError::InitFailed));
    }

    #[test]
    fn test_negative_count_fails_and_cleans_up() {
        let err = NativeMonitor::from_api(fake_api(init_negative)).err().unwrap();
        assert!(matches!(err, MonitorError::InitFailed));
        let ctx = NEGATIVE_CTX.load(Ordering::SeqCst) as *const FakeCtx;
        assert_eq!(cleanups(ctx), 1);
    }

    #[test]
    fn test_cleanup_runs_exactly_once() {
        let monitor = NativeMonitor::from_api(fake_api(init_two)).unwrap();
        let ctx = monitor.ctx.as_ptr() as *const FakeCtx;
        assert_eq!(cleanups(ctx), 0);
        drop(monitor);
        assert_eq!(cleanups(ctx), 1);
    }

    #[test]
    fn test_successful_query() {
        let mut monitor = NativeMonitor::from_api(fake_api(init_two)).unwrap();
        let temps = monitor.temperatures(0).unwrap();
        assert_eq!(
            temps,
            Temperatures {
                core: 55,
                junction: 71,
                vram: 64
            }
        );
    }

    #[test]
    fn test_failed_query_carries_library_message() {
        let mut monitor = NativeMonitor::from_api(fake_api(init_two)).unwrap();
        match monitor.temperatures(1) {
            Err(MonitorError::Query { device, message }) => {
                assert_eq!(device, 1);
                assert_eq!(message, "sensor offline");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_index_never_reaches_library() {
        let mut monitor = NativeMonitor::from_api(fake_api(init_two)).unwrap();
        let err = monitor.temperatures(2).err().unwrap();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_error_message_stops_at_nul() {
        let mut temps = GpuTemperatures::zeroed();
        for (dst, src) in temps.error_message.iter_mut().zip(b"bad bar\0trailing") {
            *dst = *src as c_char;
        }
        assert_eq!(temps.error_message(), "bad bar");
    }

    #[test]
    fn test_error_message_unterminated_and_lossy() {
        let mut temps = GpuTemperatures::zeroed();
        temps.error_message = [b'x' as c_char; ERROR_MESSAGE_LEN];
        temps.error_message[0] = 0xffu8 as c_char;
        let msg = temps.error_message();
        assert!(msg.starts_with('\u{fffd}'));
        assert_eq!(msg.chars().filter(|&c| c == 'x').count(), ERROR_MESSAGE_LEN - 1);
    }

    #[test]
    fn test_missing_library_is_load_error() {
        let err = NativeMonitor::open("/nonexistent/libgpumonitor.so").err().unwrap();
        assert!(matches!(err, MonitorError::LibraryLoad { .. }));
        assert!(err.to_string().starts_with("Error loading the library: "));
        assert!(err.to_string().ends_with("installed the library correctly."));
    }

    #[test]
    fn test_load_reason_printed_once_in_chain() {
        let err = NativeMonitor::open("/nonexistent/libgpumonitor.so").err().unwrap();
        assert!(std::error::Error::source(&err).is_none());

        let chain = format!("{:#}", anyhow::Error::from(err));
        assert_eq!(chain.matches("/nonexistent/libgpumonitor.so").count(), 1);
    }
}
