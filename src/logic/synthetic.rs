//! Synthetic Event Generator
//!
//! Produces randomized candidate security events from a fixed scenario
//! catalog. Pure function of the random source - no side effects, no
//! failure mode. Severity is NOT decided here; that belongs to the
//! Risk Analysis Service.

use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Map, Value};

use super::types::EvidenceType;

// ============================================================================
// SCENARIOS
// ============================================================================

/// Fixed catalog of event templates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    LoginAnomaly,
    Malware,
    Exfiltration,
    Phishing,
    BruteForce,
    Ransomware,
    UnauthorizedAccess,
    Cryptomining,
}

pub const ALL_SCENARIOS: [Scenario; 8] = [
    Scenario::LoginAnomaly,
    Scenario::Malware,
    Scenario::Exfiltration,
    Scenario::Phishing,
    Scenario::BruteForce,
    Scenario::Ransomware,
    Scenario::UnauthorizedAccess,
    Scenario::Cryptomining,
];

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::LoginAnomaly => "login_anomaly",
            Scenario::Malware => "malware",
            Scenario::Exfiltration => "exfiltration",
            Scenario::Phishing => "phishing",
            Scenario::BruteForce => "brute_force",
            Scenario::Ransomware => "ransomware",
            Scenario::UnauthorizedAccess => "unauthorized_access",
            Scenario::Cryptomining => "cryptomining",
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A candidate security event, not yet risk-scored
#[derive(Debug, Clone)]
pub struct CandidateEvent {
    pub scenario: Scenario,
    pub title: String,
    pub description: String,
    pub source: String,
    pub evidence_kind: EvidenceType,
    pub evidence_value: String,
    pub evidence_description: String,
    pub attributes: Map<String, Value>,
}

// ============================================================================
// GENERATION
// ============================================================================

/// Generate one candidate from a uniformly random scenario
pub fn generate() -> CandidateEvent {
    generate_with(&mut rand::thread_rng())
}

/// Generate one candidate using the supplied random source
pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> CandidateEvent {
    let scenario = *ALL_SCENARIOS
        .choose(rng)
        .unwrap_or(&Scenario::LoginAnomaly);
    generate_scenario(rng, scenario)
}

/// Build the candidate for a specific scenario template
pub fn generate_scenario<R: Rng + ?Sized>(rng: &mut R, scenario: Scenario) -> CandidateEvent {
    match scenario {
        Scenario::LoginAnomaly => login_anomaly(rng),
        Scenario::Malware => malware(rng),
        Scenario::Exfiltration => exfiltration(rng),
        Scenario::Phishing => phishing(rng),
        Scenario::BruteForce => brute_force(rng),
        Scenario::Ransomware => ransomware(rng),
        Scenario::UnauthorizedAccess => unauthorized_access(rng),
        Scenario::Cryptomining => cryptomining(rng),
    }
}

fn login_anomaly<R: Rng + ?Sized>(rng: &mut R) -> CandidateEvent {
    let user = random_user(rng);
    let ip = random_external_ip(rng);
    let country = pick(rng, &["RU", "CN", "KP", "IR", "BR", "NG"]);
    let failed = rng.gen_range(3..25);

    let mut attributes = Map::new();
    attributes.insert("username".into(), json!(user));
    attributes.insert("source_ip".into(), json!(ip));
    attributes.insert("geo_country".into(), json!(country));
    attributes.insert("failed_login_count".into(), json!(failed));
    attributes.insert("outside_business_hours".into(), json!(rng.gen_bool(0.7)));
    attributes.insert("new_device".into(), json!(rng.gen_bool(0.5)));

    CandidateEvent {
        scenario: Scenario::LoginAnomaly,
        title: format!("Anomalous login activity for {}", user),
        description: format!(
            "{} failed login attempts for account {} from {} ({}) before a successful sign-in",
            failed, user, ip, country
        ),
        source: "Identity Provider".to_string(),
        evidence_kind: EvidenceType::Ip,
        evidence_value: ip,
        evidence_description: "Source address of the anomalous sign-in".to_string(),
        attributes,
    }
}

fn malware<R: Rng + ?Sized>(rng: &mut R) -> CandidateEvent {
    let host = random_host(rng);
    let file = pick(
        rng,
        &[
            "invoice_scan.exe",
            "svch0st.exe",
            "update_helper.dll",
            "winlogon_patch.exe",
            "driver_fix.sys",
        ],
    );
    let hash = random_sha256(rng);
    let family = pick(rng, &["Emotet", "AgentTesla", "Qakbot", "RedLine", "Remcos"]);

    let mut attributes = Map::new();
    attributes.insert("hostname".into(), json!(host));
    attributes.insert("file_name".into(), json!(file));
    attributes.insert("file_hash".into(), json!(hash));
    attributes.insert("malware_family".into(), json!(family));
    attributes.insert("detection_engine_hits".into(), json!(rng.gen_range(5..60)));
    attributes.insert("persistence_mechanism".into(), json!(rng.gen_bool(0.6)));

    CandidateEvent {
        scenario: Scenario::Malware,
        title: format!("Malware detected on {}", host),
        description: format!(
            "File {} on {} matched {} signatures (family: {})",
            file, host, "antivirus", family
        ),
        source: "EDR Sensor".to_string(),
        evidence_kind: EvidenceType::Hash,
        evidence_value: hash,
        evidence_description: format!("SHA-256 of {}", file),
        attributes,
    }
}

fn exfiltration<R: Rng + ?Sized>(rng: &mut R) -> CandidateEvent {
    let host = random_host(rng);
    let dest_ip = random_external_ip(rng);
    let mb: u64 = rng.gen_range(50..5_000);

    let mut attributes = Map::new();
    attributes.insert("hostname".into(), json!(host));
    attributes.insert("destination_ip".into(), json!(dest_ip));
    attributes.insert("bytes_transferred".into(), json!(mb * 1024 * 1024));
    attributes.insert("transfer_window_minutes".into(), json!(rng.gen_range(5..120)));
    attributes.insert("protocol".into(), json!(pick(rng, &["https", "dns", "ftp", "ssh"])));
    attributes.insert("ip_reputation_score".into(), json!(rng.gen_range(5..40)));

    CandidateEvent {
        scenario: Scenario::Exfiltration,
        title: format!("Possible data exfiltration from {}", host),
        description: format!(
            "{} MB transferred from {} to low-reputation address {}",
            mb, host, dest_ip
        ),
        source: "Network Monitor".to_string(),
        evidence_kind: EvidenceType::Ip,
        evidence_value: dest_ip,
        evidence_description: "Destination of the bulk outbound transfer".to_string(),
        attributes,
    }
}

fn phishing<R: Rng + ?Sized>(rng: &mut R) -> CandidateEvent {
    let user = random_user(rng);
    let sender = format!(
        "{}@{}",
        pick(rng, &["support", "billing", "it-helpdesk", "security", "hr"]),
        pick(
            rng,
            &[
                "micros0ft-support.com",
                "account-verify.net",
                "secure-mailbox.io",
                "corp-login.org",
            ],
        )
    );
    let url = format!(
        "https://{}/login",
        pick(
            rng,
            &[
                "portal-sso-verify.com",
                "office365-renew.net",
                "mfa-reset.info",
                "docusign-view.org",
            ],
        )
    );

    let mut attributes = Map::new();
    attributes.insert("recipient".into(), json!(user));
    attributes.insert("sender".into(), json!(sender));
    attributes.insert("landing_url".into(), json!(url));
    attributes.insert("recipients_targeted".into(), json!(rng.gen_range(1..80)));
    attributes.insert("link_clicked".into(), json!(rng.gen_bool(0.3)));
    attributes.insert("spf_pass".into(), json!(false));

    CandidateEvent {
        scenario: Scenario::Phishing,
        title: "Phishing campaign detected".to_string(),
        description: format!(
            "Credential-harvesting mail from {} delivered to {} with lure {}",
            sender, user, url
        ),
        source: "Email Gateway".to_string(),
        evidence_kind: EvidenceType::Url,
        evidence_value: url,
        evidence_description: "Credential harvesting landing page".to_string(),
        attributes,
    }
}

fn brute_force<R: Rng + ?Sized>(rng: &mut R) -> CandidateEvent {
    let ip = random_external_ip(rng);
    let service = pick(rng, &["ssh", "rdp", "vpn", "smtp", "owa"]);
    let attempts = rng.gen_range(100..5_000);

    let mut attributes = Map::new();
    attributes.insert("source_ip".into(), json!(ip));
    attributes.insert("target_service".into(), json!(service));
    attributes.insert("attempt_count".into(), json!(attempts));
    attributes.insert("distinct_accounts".into(), json!(rng.gen_range(1..200)));
    attributes.insert("duration_minutes".into(), json!(rng.gen_range(2..90)));
    attributes.insert("ip_reputation_score".into(), json!(rng.gen_range(1..30)));

    CandidateEvent {
        scenario: Scenario::BruteForce,
        title: format!("Brute force against {} from {}", service, ip),
        description: format!(
            "{} authentication attempts against {} recorded from {}",
            attempts, service, ip
        ),
        source: "Perimeter Firewall".to_string(),
        evidence_kind: EvidenceType::Ip,
        evidence_value: ip,
        evidence_description: "Address driving the password-guessing burst".to_string(),
        attributes,
    }
}

fn ransomware<R: Rng + ?Sized>(rng: &mut R) -> CandidateEvent {
    let host = random_host(rng);
    let encrypted = rng.gen_range(200..20_000);
    let ext = pick(rng, &[".lockbit", ".crypt", ".akira", ".blackcat", ".play"]);
    let note = format!("C:\\Users\\Public\\README{}.txt", ext);

    let mut attributes = Map::new();
    attributes.insert("hostname".into(), json!(host));
    attributes.insert("files_encrypted".into(), json!(encrypted));
    attributes.insert("ransom_extension".into(), json!(ext));
    attributes.insert("ransom_note_path".into(), json!(note));
    attributes.insert("shadow_copies_deleted".into(), json!(rng.gen_bool(0.8)));
    attributes.insert("encryption_rate_files_per_sec".into(), json!(rng.gen_range(10..400)));

    CandidateEvent {
        scenario: Scenario::Ransomware,
        title: format!("Ransomware activity on {}", host),
        description: format!(
            "{} files renamed with extension {} on {}; ransom note dropped",
            encrypted, ext, host
        ),
        source: "EDR Sensor".to_string(),
        evidence_kind: EvidenceType::File,
        evidence_value: note,
        evidence_description: "Ransom note dropped during encryption".to_string(),
        attributes,
    }
}

fn unauthorized_access<R: Rng + ?Sized>(rng: &mut R) -> CandidateEvent {
    let user = random_user(rng);
    let resource = pick(
        rng,
        &[
            "finance-share",
            "hr-records",
            "prod-db-admin",
            "source-repo",
            "payroll-export",
        ],
    );

    let mut attributes = Map::new();
    attributes.insert("username".into(), json!(user));
    attributes.insert("resource".into(), json!(resource));
    attributes.insert("access_granted".into(), json!(rng.gen_bool(0.4)));
    attributes.insert("privilege_escalation".into(), json!(rng.gen_bool(0.5)));
    attributes.insert("access_attempts".into(), json!(rng.gen_range(1..15)));

    CandidateEvent {
        scenario: Scenario::UnauthorizedAccess,
        title: format!("Unauthorized access attempt to {}", resource),
        description: format!(
            "Account {} attempted access to restricted resource {} without entitlement",
            user, resource
        ),
        source: "Access Audit".to_string(),
        evidence_kind: EvidenceType::Other,
        evidence_value: format!("{}:{}", user, resource),
        evidence_description: "Account/resource pair of the denied access".to_string(),
        attributes,
    }
}

fn cryptomining<R: Rng + ?Sized>(rng: &mut R) -> CandidateEvent {
    let host = random_host(rng);
    let pool = pick(
        rng,
        &[
            "pool.minexmr.org",
            "xmr.nanopool.net",
            "stratum.hashvault.pro",
            "mine.c3pool.com",
        ],
    );
    let cpu = rng.gen_range(80..100);

    let mut attributes = Map::new();
    attributes.insert("hostname".into(), json!(host));
    attributes.insert("mining_pool".into(), json!(pool));
    attributes.insert("cpu_usage_percent".into(), json!(cpu));
    attributes.insert("sustained_minutes".into(), json!(rng.gen_range(20..600)));
    attributes.insert("process_name".into(), json!(pick(rng, &["xmrig", "kswapd0", "dbus-daemon2"])));

    CandidateEvent {
        scenario: Scenario::Cryptomining,
        title: format!("Cryptomining behavior on {}", host),
        description: format!(
            "Sustained {}% CPU on {} with stratum traffic to {}",
            cpu, host, pool
        ),
        source: "Network Monitor".to_string(),
        evidence_kind: EvidenceType::Domain,
        evidence_value: pool,
        evidence_description: "Mining pool contacted over stratum".to_string(),
        attributes,
    }
}

// ============================================================================
// RANDOM HELPERS
// ============================================================================

fn pick<R: Rng + ?Sized>(rng: &mut R, options: &[&str]) -> String {
    options
        .choose(rng)
        .copied()
        .unwrap_or_default()
        .to_string()
}

fn random_user<R: Rng + ?Sized>(rng: &mut R) -> String {
    let first = pick(rng, &["j", "m", "a", "s", "k", "d", "l"]);
    let last = pick(
        rng,
        &["nguyen", "smith", "garcia", "chen", "patel", "kim", "murphy"],
    );
    format!("{}{}{}", first, last, rng.gen_range(1..99))
}

fn random_host<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!(
        "{}-{:03}",
        pick(rng, &["ws", "lt", "srv", "db", "vdi"]),
        rng.gen_range(1..500)
    )
}

fn random_external_ip<R: Rng + ?Sized>(rng: &mut R) -> String {
    // Avoid RFC1918 first octets so values read as external
    let first = pick(rng, &["45", "91", "103", "141", "185", "203"]);
    format!(
        "{}.{}.{}.{}",
        first,
        rng.gen_range(1..255),
        rng.gen_range(1..255),
        rng.gen_range(1..255)
    )
}

fn random_sha256<R: Rng + ?Sized>(rng: &mut R) -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    (0..64)
        .map(|_| HEX[rng.gen_range(0..HEX.len())] as char)
        .collect()
}
