//! # mediafx-frei0r
//!
//! frei0r plugins that forward every frame to a MediaFX render client.
//! frei0r loads one shared object per plugin, so each kind is its own
//! `cdylib` crate (`mediafx-frei0r-source`, `-filter`, `-mixer2`,
//! `-mixer3`) expanding [`export_plugin!`] for one [`Frei0rKind`].
//!
//! Parameters, in frei0r index order:
//!
//! | index | name          | type   |
//! |-------|---------------|--------|
//! | 0     | `client_path` | string |
//! | 1     | `config`      | string |
//! | 2..=4 | `param1..3`   | double |
//!
//! The client starts on the first update after `client_path` is set.
//! Failures are logged to stderr (`RUST_LOG` controls the level) and
//! leave the output frame as the host passed it.

use std::ffi::{CStr, CString};

use tracing::warn;
use tracing_subscriber::EnvFilter;

use mediafx_core::FrameServerPlugin;
pub use mediafx_core::{Filter, Mixer2, Mixer3, PluginKind, Source};

pub mod abi;

use abi::{
    F0R_COLOR_MODEL_RGBA8888, F0R_PARAM_DOUBLE, F0R_PARAM_STRING, F0R_PLUGIN_TYPE_FILTER,
    F0R_PLUGIN_TYPE_MIXER2, F0R_PLUGIN_TYPE_MIXER3, F0R_PLUGIN_TYPE_SOURCE, F0rInstance,
    F0rParam, F0rParamInfo, F0rPluginInfo, FREI0R_MAJOR_VERSION, c_char, c_int, c_uint,
};

// ── Kinds ────────────────────────────────────────────────────────

/// A [`PluginKind`] with its frei0r type and C strings.
pub trait Frei0rKind: PluginKind {
    const PLUGIN_TYPE: c_int;
    const C_NAME: &'static CStr;
    const C_EXPLANATION: &'static CStr;
}

impl Frei0rKind for Source {
    const PLUGIN_TYPE: c_int = F0R_PLUGIN_TYPE_SOURCE;
    const C_NAME: &'static CStr = c"MediaFX source";
    const C_EXPLANATION: &'static CStr = c"Renders frames with a MediaFX source client";
}

impl Frei0rKind for Filter {
    const PLUGIN_TYPE: c_int = F0R_PLUGIN_TYPE_FILTER;
    const C_NAME: &'static CStr = c"MediaFX filter";
    const C_EXPLANATION: &'static CStr = c"Filters frames with a MediaFX filter client";
}

impl Frei0rKind for Mixer2 {
    const PLUGIN_TYPE: c_int = F0R_PLUGIN_TYPE_MIXER2;
    const C_NAME: &'static CStr = c"MediaFX mixer2";
    const C_EXPLANATION: &'static CStr = c"Mixes two frames with a MediaFX mixer client";
}

impl Frei0rKind for Mixer3 {
    const PLUGIN_TYPE: c_int = F0R_PLUGIN_TYPE_MIXER3;
    const C_NAME: &'static CStr = c"MediaFX mixer3";
    const C_EXPLANATION: &'static CStr = c"Mixes three frames with a MediaFX mixer client";
}

// ── Parameters ───────────────────────────────────────────────────

const AUTHOR: &CStr = c"MediaFX";

const CLIENT_PATH: c_int = 0;
const CONFIG: c_int = 1;
const PARAM1: c_int = 2;
const PARAM3: c_int = 4;

struct ParamSpec {
    name: &'static CStr,
    param_type: c_int,
    explanation: &'static CStr,
}

const PARAMS: [ParamSpec; 5] = [
    ParamSpec {
        name: c"client_path",
        param_type: F0R_PARAM_STRING,
        explanation: c"MediaFX render client executable path",
    },
    ParamSpec {
        name: c"config",
        param_type: F0R_PARAM_STRING,
        explanation: c"MediaFX render client configuration",
    },
    ParamSpec {
        name: c"param1",
        param_type: F0R_PARAM_DOUBLE,
        explanation: c"Render client parameter 1",
    },
    ParamSpec {
        name: c"param2",
        param_type: F0R_PARAM_DOUBLE,
        explanation: c"Render client parameter 2",
    },
    ParamSpec {
        name: c"param3",
        param_type: F0R_PARAM_DOUBLE,
        explanation: c"Render client parameter 3",
    },
];

fn param_spec(index: c_int) -> Option<&'static ParamSpec> {
    usize::try_from(index).ok().and_then(|index| PARAMS.get(index))
}

// ── Instance ─────────────────────────────────────────────────────

/// One plugin instance behind an `f0r_instance_t`.
pub struct Instance<K: PluginKind> {
    plugin: FrameServerPlugin<K>,
    /// C copies of the string params; `f0r_get_param_value` hands out
    /// pointers into these, valid until the next set.
    client_path: CString,
    config: CString,
    pixels: usize,
}

impl<K: PluginKind> Instance<K> {
    fn new(width: c_uint, height: c_uint) -> Self {
        Instance {
            plugin: FrameServerPlugin::new(width, height),
            client_path: CString::default(),
            config: CString::default(),
            pixels: width as usize * height as usize,
        }
    }

    pub fn plugin(&self) -> &FrameServerPlugin<K> {
        &self.plugin
    }

    fn set_string(&mut self, index: c_int, value: &CStr) {
        let Ok(text) = value.to_str() else {
            warn!(plugin = K::NAME, index, "ignoring non UTF-8 string parameter");
            return;
        };
        if index == CLIENT_PATH {
            self.plugin.set_client_path(text);
            self.client_path = value.to_owned();
        } else {
            self.plugin.set_config(text);
            self.config = value.to_owned();
        }
    }

    fn double(&self, index: c_int) -> f64 {
        let params = self.plugin.params();
        match index {
            PARAM1 => params.param1,
            PARAM3 => params.param3,
            _ => params.param2,
        }
    }

    fn set_double(&mut self, index: c_int, value: f64) {
        let params = self.plugin.params();
        let mut values = [params.param1, params.param2, params.param3];
        values[(index - PARAM1) as usize] = value;
        let [param1, param2, param3] = values;
        self.plugin.set_params(param1, param2, param3);
    }
}

// ── Entry points ─────────────────────────────────────────────────

/// `f0r_init`: install the stderr log subscriber unless the host
/// process already has one.
pub fn init() -> c_int {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
    1
}

/// `f0r_get_plugin_info`
///
/// # Safety
/// `info` must be null or point to a writable `f0r_plugin_info_t`.
pub unsafe fn plugin_info<K: Frei0rKind>(info: *mut F0rPluginInfo) {
    let Some(info) = (unsafe { info.as_mut() }) else {
        return;
    };
    let version = FrameServerPlugin::<K>::info();
    *info = F0rPluginInfo {
        name: K::C_NAME.as_ptr(),
        author: AUTHOR.as_ptr(),
        plugin_type: K::PLUGIN_TYPE,
        color_model: F0R_COLOR_MODEL_RGBA8888,
        frei0r_version: FREI0R_MAJOR_VERSION,
        major_version: version.major_version as c_int,
        minor_version: version.minor_version as c_int,
        num_params: PARAMS.len() as c_int,
        explanation: K::C_EXPLANATION.as_ptr(),
    };
}

/// `f0r_get_param_info`
///
/// # Safety
/// `info` must be null or point to a writable `f0r_param_info_t`.
pub unsafe fn param_info(info: *mut F0rParamInfo, index: c_int) {
    let (Some(info), Some(spec)) = (unsafe { info.as_mut() }, param_spec(index)) else {
        return;
    };
    *info = F0rParamInfo {
        name: spec.name.as_ptr(),
        param_type: spec.param_type,
        explanation: spec.explanation.as_ptr(),
    };
}

/// `f0r_construct`
pub fn construct<K: PluginKind>(width: c_uint, height: c_uint) -> F0rInstance {
    Box::into_raw(Box::new(Instance::<K>::new(width, height))).cast()
}

/// `f0r_destruct`: terminates a running client.
///
/// # Safety
/// `instance` must be null or come from [`construct`] with the same `K`,
/// and must not be used afterwards.
pub unsafe fn destruct<K: PluginKind>(instance: F0rInstance) {
    if !instance.is_null() {
        drop(unsafe { Box::from_raw(instance.cast::<Instance<K>>()) });
    }
}

/// # Safety
/// `instance` must be null or a live pointer from [`construct`] with the
/// same `K`.
pub unsafe fn instance_mut<'a, K: PluginKind>(
    instance: F0rInstance,
) -> Option<&'a mut Instance<K>> {
    unsafe { instance.cast::<Instance<K>>().as_mut() }
}

/// `f0r_set_param_value`
///
/// # Safety
/// `instance` as for [`destruct`]. `param` must be null or point to a
/// `double` or a `char *` (a nul-terminated string or null), matching
/// the parameter type at `index`.
pub unsafe fn set_param_value<K: PluginKind>(
    instance: F0rInstance,
    param: F0rParam,
    index: c_int,
) {
    let Some(instance) = (unsafe { instance_mut::<K>(instance) }) else {
        return;
    };
    if param.is_null() {
        return;
    }
    match param_spec(index).map(|spec| spec.param_type) {
        Some(F0R_PARAM_STRING) => {
            let value = unsafe { *param.cast::<*const c_char>() };
            if !value.is_null() {
                instance.set_string(index, unsafe { CStr::from_ptr(value) });
            }
        }
        Some(_) => instance.set_double(index, unsafe { *param.cast::<f64>() }),
        None => warn!(plugin = K::NAME, index, "unknown parameter"),
    }
}

/// `f0r_get_param_value`
///
/// # Safety
/// As for [`set_param_value`], with `param` writable.
pub unsafe fn get_param_value<K: PluginKind>(
    instance: F0rInstance,
    param: F0rParam,
    index: c_int,
) {
    let Some(instance) = (unsafe { instance_mut::<K>(instance) }) else {
        return;
    };
    if param.is_null() {
        return;
    }
    match index {
        CLIENT_PATH => unsafe { *param.cast::<*const c_char>() = instance.client_path.as_ptr() },
        CONFIG => unsafe { *param.cast::<*const c_char>() = instance.config.as_ptr() },
        PARAM1..=PARAM3 => unsafe { *param.cast::<f64>() = instance.double(index) },
        _ => warn!(plugin = K::NAME, index, "unknown parameter"),
    }
}

/// `f0r_update` / `f0r_update2`. Only the first `K::FRAME_COUNT` inputs
/// are read.
///
/// # Safety
/// `instance` as for [`destruct`]. Each used input and `outframe` must
/// be null or point to `width * height` pixels, the output writable and
/// not overlapping any input.
pub unsafe fn update<K: PluginKind>(
    instance: F0rInstance,
    time: f64,
    inframes: [*const u32; 3],
    outframe: *mut u32,
) {
    let Some(instance) = (unsafe { instance_mut::<K>(instance) }) else {
        return;
    };
    if outframe.is_null() {
        return;
    }
    let pixels = instance.pixels;
    let mut inputs = Vec::with_capacity(K::FRAME_COUNT);
    for &frame in &inframes[..K::FRAME_COUNT] {
        if frame.is_null() {
            warn!(plugin = K::NAME, "missing input frame");
            return;
        }
        inputs.push(unsafe { std::slice::from_raw_parts(frame, pixels) });
    }
    let output = unsafe { std::slice::from_raw_parts_mut(outframe, pixels) };
    // Render failures are logged by the plugin, which restarts the client
    // on the next update.
    let _ = instance.plugin.update(time, &inputs, output);
}

// ── Export ───────────────────────────────────────────────────────

/// Export the frei0r C entry points for one [`Frei0rKind`].
///
/// ```ignore
/// mediafx_frei0r::export_plugin!(mediafx_frei0r::Filter);
/// ```
#[macro_export]
macro_rules! export_plugin {
    ($kind:ty) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn f0r_init() -> $crate::abi::c_int {
            $crate::init()
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn f0r_deinit() {}

        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn f0r_get_plugin_info(info: *mut $crate::abi::F0rPluginInfo) {
            unsafe { $crate::plugin_info::<$kind>(info) }
        }

        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn f0r_get_param_info(
            info: *mut $crate::abi::F0rParamInfo,
            param_index: $crate::abi::c_int,
        ) {
            unsafe { $crate::param_info(info, param_index) }
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn f0r_construct(
            width: $crate::abi::c_uint,
            height: $crate::abi::c_uint,
        ) -> $crate::abi::F0rInstance {
            $crate::construct::<$kind>(width, height)
        }

        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn f0r_destruct(instance: $crate::abi::F0rInstance) {
            unsafe { $crate::destruct::<$kind>(instance) }
        }

        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn f0r_set_param_value(
            instance: $crate::abi::F0rInstance,
            param: $crate::abi::F0rParam,
            param_index: $crate::abi::c_int,
        ) {
            unsafe { $crate::set_param_value::<$kind>(instance, param, param_index) }
        }

        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn f0r_get_param_value(
            instance: $crate::abi::F0rInstance,
            param: $crate::abi::F0rParam,
            param_index: $crate::abi::c_int,
        ) {
            unsafe { $crate::get_param_value::<$kind>(instance, param, param_index) }
        }

        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn f0r_update(
            instance: $crate::abi::F0rInstance,
            time: f64,
            inframe: *const u32,
            outframe: *mut u32,
        ) {
            let none = ::std::ptr::null();
            unsafe { $crate::update::<$kind>(instance, time, [inframe, none, none], outframe) }
        }

        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn f0r_update2(
            instance: $crate::abi::F0rInstance,
            time: f64,
            inframe1: *const u32,
            inframe2: *const u32,
            inframe3: *const u32,
            outframe: *mut u32,
        ) {
            unsafe {
                $crate::update::<$kind>(instance, time, [inframe1, inframe2, inframe3], outframe)
            }
        }
    };
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    fn info<K: Frei0rKind>() -> F0rPluginInfo {
        let mut info = F0rPluginInfo {
            name: ptr::null(),
            author: ptr::null(),
            plugin_type: -1,
            color_model: -1,
            frei0r_version: 0,
            major_version: 0,
            minor_version: 0,
            num_params: 0,
            explanation: ptr::null(),
        };
        unsafe { plugin_info::<K>(&mut info) };
        info
    }

    fn set_string<K: PluginKind>(instance: F0rInstance, index: c_int, value: &CStr) {
        let mut value = value.as_ptr();
        unsafe { set_param_value::<K>(instance, (&raw mut value).cast(), index) };
    }

    fn get_string<K: PluginKind>(instance: F0rInstance, index: c_int) -> String {
        let mut value: *const c_char = ptr::null();
        unsafe { get_param_value::<K>(instance, (&raw mut value).cast(), index) };
        unsafe { CStr::from_ptr(value) }.to_str().unwrap().to_owned()
    }

    #[test]
    fn c_names_match_kind_names() {
        assert_eq!(Source::C_NAME.to_str().unwrap(), Source::NAME);
        assert_eq!(Filter::C_NAME.to_str().unwrap(), Filter::NAME);
        assert_eq!(Mixer2::C_NAME.to_str().unwrap(), Mixer2::NAME);
        assert_eq!(Mixer3::C_NAME.to_str().unwrap(), Mixer3::NAME);
        assert_eq!(Mixer3::C_EXPLANATION.to_str().unwrap(), Mixer3::EXPLANATION);
    }

    #[test]
    fn plugin_info_describes_kind() {
        let mixer2 = info::<Mixer2>();
        assert_eq!(mixer2.plugin_type, F0R_PLUGIN_TYPE_MIXER2);
        assert_eq!(mixer2.color_model, F0R_COLOR_MODEL_RGBA8888);
        assert_eq!(mixer2.frei0r_version, FREI0R_MAJOR_VERSION);
        assert_eq!(mixer2.num_params, 5);
        assert_eq!(unsafe { CStr::from_ptr(mixer2.name) }, c"MediaFX mixer2");
        assert_eq!(info::<Source>().plugin_type, F0R_PLUGIN_TYPE_SOURCE);
    }

    #[test]
    fn param_info_in_index_order() {
        let mut info = F0rParamInfo {
            name: ptr::null(),
            param_type: -1,
            explanation: ptr::null(),
        };
        let mut names = Vec::new();
        for index in 0..5 {
            unsafe { param_info(&mut info, index) };
            names.push(unsafe { CStr::from_ptr(info.name) }.to_str().unwrap());
            let expected = if index < 2 { F0R_PARAM_STRING } else { F0R_PARAM_DOUBLE };
            assert_eq!(info.param_type, expected);
        }
        assert_eq!(names, ["client_path", "config", "param1", "param2", "param3"]);

        // Out of range leaves the struct alone.
        unsafe { param_info(&mut info, 5) };
        assert_eq!(unsafe { CStr::from_ptr(info.name) }, c"param3");
    }

    #[test]
    fn string_params_round_trip() {
        let instance = construct::<Filter>(2, 2);
        assert_eq!(get_string::<Filter>(instance, CLIENT_PATH), "");

        set_string::<Filter>(instance, CLIENT_PATH, c"/opt/mediafx/shift");
        set_string::<Filter>(instance, CONFIG, c"log_level = \"debug\"");
        assert_eq!(get_string::<Filter>(instance, CLIENT_PATH), "/opt/mediafx/shift");
        assert_eq!(get_string::<Filter>(instance, CONFIG), "log_level = \"debug\"");

        let plugin = unsafe { instance_mut::<Filter>(instance) }.unwrap().plugin();
        assert_eq!(plugin.params().client_path, "/opt/mediafx/shift");
        unsafe { destruct::<Filter>(instance) };
    }

    #[test]
    fn double_params_round_trip() {
        let instance = construct::<Mixer3>(1, 1);
        for (index, value) in [(2, 0.25), (3, 0.5), (4, 0.75)] {
            let mut value: f64 = value;
            unsafe { set_param_value::<Mixer3>(instance, (&raw mut value).cast(), index) };
        }
        let mut value = 0.0f64;
        unsafe { get_param_value::<Mixer3>(instance, (&raw mut value).cast(), 3) };
        assert_eq!(value, 0.5);

        let params = unsafe { instance_mut::<Mixer3>(instance) }.unwrap().plugin().params();
        assert_eq!((params.param1, params.param2, params.param3), (0.25, 0.5, 0.75));
        unsafe { destruct::<Mixer3>(instance) };
    }

    #[test]
    fn invalid_utf8_string_is_ignored() {
        let instance = construct::<Source>(1, 1);
        set_string::<Source>(instance, CONFIG, c"\xff\xfe");
        assert_eq!(get_string::<Source>(instance, CONFIG), "");
        unsafe { destruct::<Source>(instance) };
    }

    #[test]
    fn null_pointers_are_ignored() {
        let instance = construct::<Filter>(2, 1);
        unsafe {
            set_param_value::<Filter>(instance, ptr::null_mut(), CLIENT_PATH);
            set_param_value::<Filter>(ptr::null_mut(), ptr::null_mut(), CLIENT_PATH);
            update::<Filter>(instance, 0.0, [ptr::null(); 3], ptr::null_mut());
            plugin_info::<Filter>(ptr::null_mut());
            destruct::<Filter>(ptr::null_mut());
        }
        // A filter without its input frame leaves the output alone.
        let mut output = [9u32; 2];
        unsafe { update::<Filter>(instance, 0.0, [ptr::null(); 3], output.as_mut_ptr()) };
        assert_eq!(output, [9; 2]);
        unsafe { destruct::<Filter>(instance) };
    }

    #[test]
    fn update_without_client_keeps_output() {
        let instance = construct::<Source>(2, 2);
        set_string::<Source>(instance, CLIENT_PATH, c"/nonexistent/mediafx-client");
        let mut output = [3u32; 4];
        unsafe { update::<Source>(instance, 0.0, [ptr::null(); 3], output.as_mut_ptr()) };
        assert_eq!(output, [3; 4]);
        unsafe { destruct::<Source>(instance) };
    }
}
