use crate::infra::{parse_expectation, InMemoryProfileStore, InlineTextExtractor, TracingAuditLog};
use clap::Args;
use provider_trust::config::AppConfig;
use provider_trust::error::AppError;
use provider_trust::workflows::verification::{
    ProfileUpdate, ProviderVerificationService, VerificationDocument, VerificationResult,
    VerificationScorer, VerificationSettings,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

const SAMPLE_CERTIFICATE: &str = "REPUBLIQUE DU SENEGAL\n\
Certificat d'enregistrement N° RC-2021-017733\n\
Etablissement : Centre de Sante Keur Massar\n\
Representant legal : Dr. Moussa Diallo\n\
Autorite : Ordre des Medecins";

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// File holding the text extracted from the document
    #[arg(long)]
    pub(crate) text: PathBuf,
    /// Expected value as FIELD=VALUE, for example registrationNumber=RC-2019-004512
    #[arg(long = "expect", value_parser = parse_expectation, required = true)]
    pub(crate) expectations: Vec<(String, String)>,
    /// Pretty-print the JSON result
    #[arg(long)]
    pub(crate) pretty: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Approve passing documents without waiting for an administrator.
    #[arg(long)]
    pub(crate) auto_approve: bool,
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let ScoreArgs {
        text,
        expectations,
        pretty,
    } = args;

    let config = AppConfig::load()?;
    let raw_text = std::fs::read_to_string(&text)?;
    let expected = expectations.into_iter().collect::<BTreeMap<_, _>>();

    let result = VerificationScorer::new(config.verification.scoring).verify(&raw_text, &expected);
    let rendered = if pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{rendered}");
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let settings = VerificationSettings {
        auto_approve: args.auto_approve,
        ..VerificationSettings::default()
    };
    let audit = Arc::new(TracingAuditLog::default());
    let service = ProviderVerificationService::new(
        Arc::new(InMemoryProfileStore::default()),
        Arc::new(InlineTextExtractor),
        audit.clone(),
        settings,
    );

    println!("Provider verification demo");
    let profile = service.register(
        ProfileUpdate::new()
            .with("name", "Centre de Santé Keur Massar")
            .with("registrationNumber", "RC-2021-017733")
            .with("registrationAuthority", "Ordre des Médecins")
            .with("legalRepresentative", "Moussa Diallo")
            .with("address", "Route de Keur Massar")
            .with("city", "Dakar")
            .with("services", serde_json::json!(["consultation", "maternité"])),
    )?;
    println!(
        "- Registered {} -> status {} (public: {})",
        profile.id,
        profile.status().label(),
        profile.is_public()
    );

    let outcome = service.submit_document(
        &profile.id,
        VerificationDocument {
            name: "certificat-enregistrement.pdf".to_string(),
            storage_key: format!("providers/{}/certificat-enregistrement.pdf", profile.id),
            extracted_text: Some(SAMPLE_CERTIFICATE.to_string()),
        },
    )?;
    render_result(&outcome.result);
    println!("- After scoring -> status {}", outcome.profile.status().label());

    let profile = if outcome.profile.is_public() {
        outcome.profile
    } else {
        service.approve(&profile.id, "admin@annuaire.example")?
    };
    println!(
        "- Approved -> status {} (public: {})",
        profile.status().label(),
        profile.is_public()
    );

    let edit = service.update_profile(
        &profile.id,
        ProfileUpdate::new().with("services", serde_json::json!(["consultation", "pédiatrie"])),
    )?;
    println!(
        "- Services edited -> status {} (revoked: {})",
        edit.profile.status().label(),
        edit.revoked
    );

    let edit = service.update_profile(
        &profile.id,
        ProfileUpdate::new().with("address", "Cité Fadia, Keur Massar"),
    )?;
    let view = edit.profile.view();
    println!(
        "- Address edited -> status {} (public: {}, reason: {})",
        view.status,
        view.is_public,
        view.revoked_reason.as_deref().unwrap_or("none")
    );

    println!("\nAudit trail");
    for entry in audit.entries() {
        match &entry.reason {
            Some(reason) => println!("  - {} {} ({reason})", entry.action.label(), entry.target),
            None => println!("  - {} {}", entry.action.label(), entry.target),
        }
    }

    Ok(())
}

fn render_result(result: &VerificationResult) {
    println!(
        "- Document score {:.2} ({}) in {} ms",
        result.overall_score,
        if result.success { "passed" } else { "failed" },
        result.processing_time_ms
    );
    for (key, field) in &result.fields {
        println!(
            "  - {key}: {:.2} {} (expected '{}', matched '{}')",
            field.similarity,
            if field.found { "found" } else { "missing" },
            field.expected_value,
            field.matched_word.as_deref().unwrap_or("-")
        );
    }
}
