use crate::rtcl_p3s7_control as pb;
use p3s7_core::{CaptureRequest, ControlError, ControlResult, Outcome, TimingConfig};

/// Trait for converting proto types to domain types
pub trait ToDomain<T> {
    fn to_domain(self) -> T;
}

/// Conversion that can fail when the response violates the wire contract.
pub trait TryToDomain<T> {
    fn try_to_domain(self, operation: &'static str) -> ControlResult<T>;
}

// Domain -> Proto

impl From<CaptureRequest> for pb::RecordImageRequest {
    fn from(request: CaptureRequest) -> Self {
        pb::RecordImageRequest {
            width: request.width,
            height: request.height,
            frames: request.frames,
        }
    }
}

impl From<TimingConfig> for pb::SetTimingGeneratorRequest {
    fn from(config: TimingConfig) -> Self {
        pb::SetTimingGeneratorRequest {
            period_us: config.period_us,
            exposure_us: config.exposure_us,
        }
    }
}

// Proto -> Domain

impl ToDomain<Outcome<()>> for pb::BoolResponse {
    fn to_domain(self) -> Outcome<()> {
        Outcome::from_ok(self.result)
    }
}

impl ToDomain<Outcome<u32>> for pb::U16Response {
    fn to_domain(self) -> Outcome<u32> {
        Outcome::from_parts(self.result, self.value)
    }
}

impl ToDomain<Outcome<f32>> for pb::F32Response {
    fn to_domain(self) -> Outcome<f32> {
        Outcome::from_parts(self.result, self.value)
    }
}

impl ToDomain<Outcome<Vec<u8>>> for pb::ReadImageResponse {
    fn to_domain(self) -> Outcome<Vec<u8>> {
        Outcome::from_parts(self.result, self.image)
    }
}

impl ToDomain<String> for pb::VersionResponse {
    fn to_domain(self) -> String {
        self.version
    }
}

fn narrow(operation: &'static str, value: u64) -> ControlResult<u32> {
    u32::try_from(value).map_err(|_| {
        ControlError::malformed(operation, format!("value {value:#x} does not fit in 32 bits"))
    })
}

impl TryToDomain<Outcome<u32>> for pb::U64Response {
    fn try_to_domain(self, operation: &'static str) -> ControlResult<Outcome<u32>> {
        if !self.result {
            return Ok(Outcome::Rejected);
        }
        narrow(operation, self.value).map(Outcome::Accepted)
    }
}

impl TryToDomain<Outcome<u32>> for pb::ReadRegResponse {
    fn try_to_domain(self, operation: &'static str) -> ControlResult<Outcome<u32>> {
        if !self.result {
            return Ok(Outcome::Rejected);
        }
        narrow(operation, self.data).map(Outcome::Accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_response_ignores_payload() {
        let response = pb::ReadRegResponse {
            result: false,
            data: u64::MAX,
        };
        assert_eq!(response.try_to_domain("ReadSysReg"), Ok(Outcome::Rejected));

        let image = pb::ReadImageResponse {
            result: false,
            image: vec![1, 2, 3],
        };
        assert_eq!(image.to_domain(), Outcome::Rejected);
    }

    #[test]
    fn test_wide_register_data_is_malformed() {
        let response = pb::ReadRegResponse {
            result: true,
            data: 0x1_0000_0000,
        };
        let err = response.try_to_domain("ReadCamReg").unwrap_err();
        assert!(matches!(
            err,
            ControlError::MalformedResponse {
                operation: "ReadCamReg",
                ..
            }
        ));
    }

    #[test]
    fn test_record_request_fields() {
        let request: pb::RecordImageRequest = CaptureRequest::new(640, 320, 20).into();
        assert_eq!((request.width, request.height, request.frames), (640, 320, 20));
    }
}
