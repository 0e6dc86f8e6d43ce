//! S3 static website endpoints per region
//!
//! Website endpoints are not derivable from the region name (some regions use
//! `s3-website-<region>`, newer ones `s3-website.<region>`), so they are kept
//! in a table together with the Route 53 hosted zone that serves them.

use crate::error::{Error, Result};

/// Website endpoint of one region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub region: &'static str,
    pub host: &'static str,
    /// Hosted zone id for alias records, absent where Route 53 has none
    pub zone: Option<&'static str>,
}

const fn ep(region: &'static str, host: &'static str, zone: Option<&'static str>) -> Endpoint {
    Endpoint { region, host, zone }
}

static REGION_ENDPOINTS: &[Endpoint] = &[
    ep("us-east-2", "s3-website.us-east-2.amazonaws.com", Some("Z2O1EMRO9K5GLX")),
    ep("us-east-1", "s3-website-us-east-1.amazonaws.com", Some("Z3AQBSTGFYJSTF")),
    ep("us-west-1", "s3-website-us-west-1.amazonaws.com", Some("Z2F56UZL2M1ACD")),
    ep("us-west-2", "s3-website-us-west-2.amazonaws.com", Some("Z3BJ6K6RIION7M")),
    ep("ca-central-1", "s3-website.ca-central-1.amazonaws.com", Some("Z1QDHH18159H29")),
    ep("ap-south-1", "s3-website.ap-south-1.amazonaws.com", Some("Z11RGJOFQNVJUP")),
    ep("ap-northeast-2", "s3-website.ap-northeast-2.amazonaws.com", Some("Z3W03O7B5YMIYP")),
    ep("ap-northeast-3", "s3-website.ap-northeast-3.amazonaws.com", Some("Z2YQB5RD63NC85")),
    ep("ap-southeast-1", "s3-website-ap-southeast-1.amazonaws.com", Some("Z3O0J2DXBE1FTB")),
    ep("ap-southeast-2", "s3-website-ap-southeast-2.amazonaws.com", Some("Z1WCIGYICN2BYD")),
    ep("ap-northeast-1", "s3-website-ap-northeast-1.amazonaws.com", Some("Z2M4EHUR26P7ZW")),
    ep("cn-northwest-1", "s3-website.cn-northwest-1.amazonaws.com.cn", None),
    ep("eu-central-1", "s3-website.eu-central-1.amazonaws.com", Some("Z21DNDUVLTQW6Q")),
    ep("eu-west-1", "s3-website-eu-west-1.amazonaws.com", Some("Z1BKCTXD74EZPE")),
    ep("eu-west-2", "s3-website.eu-west-2.amazonaws.com", Some("Z3GKZC51ZF0DB4")),
    ep("eu-west-3", "s3-website.eu-west-3.amazonaws.com", Some("Z3R1K369G5AVDG")),
    ep("sa-east-1", "s3-website-sa-east-1.amazonaws.com", Some("Z7KQH4QJS55SO")),
];

/// Look up the website endpoint of `region`
pub fn website_endpoint(region: &str) -> Result<&'static Endpoint> {
    REGION_ENDPOINTS
        .iter()
        .find(|e| e.region == region)
        .ok_or_else(|| Error::UnsupportedRegion(region.to_string()))
}

/// Public website URL of a bucket hosted in `region`
pub fn website_url(bucket: &str, region: &str) -> Result<String> {
    let endpoint = website_endpoint(region)?;
    Ok(format!("http://{bucket}.{}", endpoint.host))
}

/// Map a bucket location constraint to a region name
///
/// Buckets in us-east-1 report no constraint; very old eu-west-1 buckets
/// report the legacy `EU` value.
pub fn region_from_location(constraint: Option<&str>) -> String {
    match constraint {
        None | Some("") => "us-east-1".to_string(),
        Some("EU") => "eu-west-1".to_string(),
        Some(region) => region.to_string(),
    }
}
