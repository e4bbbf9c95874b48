//! Region to endpoint resolution.
//!
//! Each service declares its explicit per-region endpoints; any other
//! syntactically valid region falls back to the partition's URL pattern.

use crate::config::{is_valid_region, partition, AWS_REGIONS};
use crate::error::{SdkError, SdkResult};

/// Where to send a request and how to scope its signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointMetadata {
    pub endpoint: String,
    pub signing_region: String,
    pub signing_service: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RegionOverride {
    region: String,
    endpoint: String,
    signing_region: String,
}

/// Endpoint table for one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRules {
    prefix: String,
    signing_service: String,
    overrides: Vec<RegionOverride>,
    global: Option<(String, String)>,
}

impl EndpointRules {
    /// Rules for endpoint prefix `prefix` (e.g. `sqs`), signing as the
    /// same name.
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            signing_service: prefix.to_string(),
            overrides: Vec::new(),
            global: None,
        }
    }

    pub fn signing_service(mut self, service: &str) -> Self {
        self.signing_service = service.to_string();
        self
    }

    /// Explicit endpoint for one region.
    pub fn region(mut self, region: &str, endpoint: &str, signing_region: &str) -> Self {
        self.overrides.push(RegionOverride {
            region: region.to_string(),
            endpoint: endpoint.to_string(),
            signing_region: signing_region.to_string(),
        });
        self
    }

    /// Single endpoint used for every region of the `aws` partition.
    pub fn global(mut self, endpoint: &str, signing_region: &str) -> Self {
        self.global = Some((endpoint.to_string(), signing_region.to_string()));
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn resolve(&self, region: &str) -> SdkResult<EndpointMetadata> {
        if !is_valid_region(region) {
            return Err(SdkError::signing(format!(
                "the region \"{}\" is not supported by \"{}\"",
                region, self.prefix
            )));
        }

        if let Some(o) = self.overrides.iter().find(|o| o.region == region) {
            return Ok(self.metadata(&o.endpoint, &o.signing_region));
        }

        if let Some(rest) = region.strip_prefix("fips-") {
            return Ok(self.metadata(
                &format!("https://{}-fips.{}.amazonaws.com", self.prefix, rest),
                rest,
            ));
        }

        let part = partition(region);
        if let (Some((endpoint, signing_region)), "aws") = (&self.global, part) {
            return Ok(self.metadata(endpoint, signing_region));
        }

        let suffix = match part {
            "aws-cn" => "amazonaws.com.cn",
            "aws-iso" => "c2s.ic.gov",
            "aws-iso-b" => "sc2s.sgov.gov",
            _ => "amazonaws.com",
        };
        if !AWS_REGIONS.contains(&region) {
            log::debug!(
                "region \"{}\" is not in the known region list, using the {} pattern for {}",
                region,
                part,
                self.prefix
            );
        }
        Ok(self.metadata(
            &format!("https://{}.{}.{}", self.prefix, region, suffix),
            region,
        ))
    }

    fn metadata(&self, endpoint: &str, signing_region: &str) -> EndpointMetadata {
        EndpointMetadata {
            endpoint: endpoint.to_string(),
            signing_region: signing_region.to_string(),
            signing_service: self.signing_service.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqs() -> EndpointRules {
        EndpointRules::new("sqs")
            .region("fips-us-east-1", "https://sqs-fips.us-east-1.amazonaws.com", "us-east-1")
            .region("us-iso-east-1", "https://sqs.us-iso-east-1.c2s.ic.gov", "us-iso-east-1")
    }

    #[test]
    fn default_pattern() {
        let m = sqs().resolve("eu-west-1").unwrap();
        assert_eq!(m.endpoint, "https://sqs.eu-west-1.amazonaws.com");
        assert_eq!(m.signing_region, "eu-west-1");
        assert_eq!(m.signing_service, "sqs");
    }

    #[test]
    fn partition_suffixes() {
        assert_eq!(
            sqs().resolve("cn-north-1").unwrap().endpoint,
            "https://sqs.cn-north-1.amazonaws.com.cn"
        );
        assert_eq!(
            sqs().resolve("us-isob-east-1").unwrap().endpoint,
            "https://sqs.us-isob-east-1.sc2s.sgov.gov"
        );
        assert_eq!(
            sqs().resolve("us-gov-west-1").unwrap().endpoint,
            "https://sqs.us-gov-west-1.amazonaws.com"
        );
    }

    #[test]
    fn explicit_fips_entry_signs_for_base_region() {
        let m = sqs().resolve("fips-us-east-1").unwrap();
        assert_eq!(m.endpoint, "https://sqs-fips.us-east-1.amazonaws.com");
        assert_eq!(m.signing_region, "us-east-1");
    }

    #[test]
    fn fips_fallback() {
        let m = sqs().resolve("fips-us-west-2").unwrap();
        assert_eq!(m.endpoint, "https://sqs-fips.us-west-2.amazonaws.com");
        assert_eq!(m.signing_region, "us-west-2");
    }

    #[test]
    fn unknown_but_valid_region_uses_fallback() {
        let m = sqs().resolve("xx-newplace-1").unwrap();
        assert_eq!(m.endpoint, "https://sqs.xx-newplace-1.amazonaws.com");
    }

    #[test]
    fn invalid_region_is_rejected() {
        let err = sqs().resolve("Not_A_Region").unwrap_err();
        assert!(matches!(err.kind(), crate::error::ErrorKind::Signing(_)));
    }

    #[test]
    fn global_endpoint_only_in_aws_partition() {
        let sts = EndpointRules::new("iam").global("https://iam.amazonaws.com", "us-east-1");
        let m = sts.resolve("eu-central-1").unwrap();
        assert_eq!(m.endpoint, "https://iam.amazonaws.com");
        assert_eq!(m.signing_region, "us-east-1");
        assert_eq!(
            sts.resolve("cn-north-1").unwrap().endpoint,
            "https://iam.cn-north-1.amazonaws.com.cn"
        );
    }

    #[test]
    fn signing_service_override() {
        let rules = EndpointRules::new("email").signing_service("ses");
        assert_eq!(rules.resolve("us-east-1").unwrap().signing_service, "ses");
    }
}
