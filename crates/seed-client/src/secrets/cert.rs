//! Certificate issuance with rcgen

use super::{CertificateKind, SecretConfig};
use crate::error::SeedError;
use chrono::{DateTime, Datelike, Duration, Utc};
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa,
    Issuer, KeyPair, KeyUsagePurpose,
};

/// PEM encoded certificate and key
#[derive(Debug, Clone)]
pub(crate) struct IssuedCertificate {
    pub cert_pem: String,
    pub key_pem: String,
    pub issued_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

/// Signing CA material
#[derive(Debug, Clone, Copy)]
pub(crate) struct SigningCa<'a> {
    pub cert_pem: &'a str,
    pub key_pem: &'a str,
}

fn params_for(config: &SecretConfig, now: DateTime<Utc>) -> Result<(CertificateParams, DateTime<Utc>), SeedError> {
    let mut params = CertificateParams::new(config.dns_names.clone())?;

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, config.common_name.as_str());
    for org in &config.organization {
        dn.push(DnType::OrganizationName, org.as_str());
    }
    params.distinguished_name = dn;

    let valid_until = now + Duration::days(config.validity_days);
    params.not_before = rcgen::date_time_ymd(now.year(), month(now)?, day(now)?);
    params.not_after = rcgen::date_time_ymd(valid_until.year(), month(valid_until)?, day(valid_until)?);

    match config.kind {
        CertificateKind::Ca => {
            params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
            params.key_usages = vec![
                KeyUsagePurpose::KeyCertSign,
                KeyUsagePurpose::CrlSign,
                KeyUsagePurpose::DigitalSignature,
            ];
        }
        CertificateKind::Server => {
            params.is_ca = IsCa::NoCa;
            params.key_usages = vec![
                KeyUsagePurpose::DigitalSignature,
                KeyUsagePurpose::KeyEncipherment,
            ];
            params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        }
    }
    Ok((params, valid_until))
}

fn month(t: DateTime<Utc>) -> Result<u8, SeedError> {
    u8::try_from(t.month()).map_err(|e| SeedError::Certificate(e.to_string()))
}

fn day(t: DateTime<Utc>) -> Result<u8, SeedError> {
    u8::try_from(t.day()).map_err(|e| SeedError::Certificate(e.to_string()))
}

/// Issue a certificate for `config`, self-signed when `ca` is `None`
pub(crate) fn issue(config: &SecretConfig, ca: Option<SigningCa<'_>>, now: DateTime<Utc>) -> Result<IssuedCertificate, SeedError> {
    let (params, valid_until) = params_for(config, now)?;
    let key_pair = KeyPair::generate()?;

    let cert = match ca {
        None => params.self_signed(&key_pair)?,
        Some(ca) => {
            let ca_key = KeyPair::from_pem(ca.key_pem)?;
            let issuer = Issuer::from_ca_cert_pem(ca.cert_pem, &ca_key)?;
            params.signed_by(&key_pair, &issuer)?
        }
    };

    Ok(IssuedCertificate {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
        issued_at: now,
        valid_until,
    })
}

/// Whether a certificate has used up 80% of its lifetime
pub(crate) fn needs_renewal(issued_at: DateTime<Utc>, valid_until: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let lifetime = valid_until - issued_at;
    let renew_at = issued_at + lifetime * 4 / 5;
    now >= renew_at
}
