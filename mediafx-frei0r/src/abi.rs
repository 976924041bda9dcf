//! The parts of `frei0r.h` (API version 1.2) the plugins use.

pub use libc::{c_char, c_int, c_uint};

pub const FREI0R_MAJOR_VERSION: c_int = 1;

pub const F0R_PLUGIN_TYPE_FILTER: c_int = 0;
pub const F0R_PLUGIN_TYPE_SOURCE: c_int = 1;
pub const F0R_PLUGIN_TYPE_MIXER2: c_int = 2;
pub const F0R_PLUGIN_TYPE_MIXER3: c_int = 3;

pub const F0R_COLOR_MODEL_RGBA8888: c_int = 1;

pub const F0R_PARAM_DOUBLE: c_int = 1;
pub const F0R_PARAM_STRING: c_int = 4;

/// `f0r_plugin_info_t`
#[repr(C)]
#[derive(Debug)]
pub struct F0rPluginInfo {
    pub name: *const c_char,
    pub author: *const c_char,
    pub plugin_type: c_int,
    pub color_model: c_int,
    pub frei0r_version: c_int,
    pub major_version: c_int,
    pub minor_version: c_int,
    pub num_params: c_int,
    pub explanation: *const c_char,
}

/// `f0r_param_info_t`
#[repr(C)]
#[derive(Debug)]
pub struct F0rParamInfo {
    pub name: *const c_char,
    pub param_type: c_int,
    pub explanation: *const c_char,
}

/// `f0r_instance_t`
pub type F0rInstance = *mut libc::c_void;

/// `f0r_param_t`: points at a `double` or a `char *` depending on the
/// parameter type.
pub type F0rParam = *mut libc::c_void;
