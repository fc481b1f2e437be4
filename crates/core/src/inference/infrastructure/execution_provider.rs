use crate::inference::domain::inference_error::ModelLoadError;

/// Hardware providers tried before ONNX Runtime's CPU fallback: CoreML on
/// macOS, DirectML on Windows, none elsewhere.
pub fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Maps a device name (`CPU`, `GPU`, `AUTO`; case-insensitive) to the
/// execution providers to register. An empty list means the default CPU
/// provider.
pub fn execution_providers_for(
    device: &str,
) -> Result<Vec<ort::execution_providers::ExecutionProviderDispatch>, ModelLoadError> {
    match normalize_device(device) {
        Some(Device::Cpu) => Ok(Vec::new()),
        Some(Device::Accelerated) => Ok(preferred_execution_providers()),
        None => Err(ModelLoadError::UnsupportedDevice {
            device: device.to_string(),
        }),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Device {
    Cpu,
    Accelerated,
}

fn normalize_device(device: &str) -> Option<Device> {
    match device.trim().to_ascii_uppercase().as_str() {
        "CPU" => Some(Device::Cpu),
        "GPU" | "AUTO" => Some(Device::Accelerated),
        _ => None,
    }
}
