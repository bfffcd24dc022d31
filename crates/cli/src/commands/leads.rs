use std::sync::Arc;

use crate::commands::CommandResult;
use leadops_core::config::{AppConfig, LoadOptions};
use leadops_core::{
    DirectLead, FollowUpLead, LeadPipeline, PipelineError, PipelineSettings, UserId,
};
use leadops_db::{
    connect_with_config, migrations, SqlFeedbackStore, SqlIdentityResolver, SqlLeadHistoryStore,
};

pub fn run(user_id: i64, follow_up: bool) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "leads",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "leads",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let pipeline = LeadPipeline::new(
            Arc::new(SqlLeadHistoryStore::new(pool.clone())),
            Arc::new(SqlFeedbackStore::new(pool.clone())),
            Arc::new(SqlIdentityResolver::new(pool.clone())),
            PipelineSettings::from(&config.pipeline),
        );

        let listing = async {
            let manager = pipeline.resolve_manager(UserId(user_id)).await?;
            let lines = if follow_up {
                let leads = pipeline.select_current_follow_up_leads(&manager).await?;
                render_follow_up(&manager.to_string(), &leads)
            } else {
                let leads = pipeline.select_current_direct_leads(&manager).await?;
                render_direct(&manager.to_string(), &leads)
            };
            Ok::<String, PipelineError>(lines)
        }
        .await
        .map_err(classify);

        pool.close().await;
        listing
    });

    match result {
        Ok(message) => CommandResult::success("leads", message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("leads", error_class, message, exit_code)
        }
    }
}

fn classify(error: PipelineError) -> (&'static str, String, u8) {
    match error {
        PipelineError::NotFound { .. } => ("unknown_manager", error.to_string(), 7),
        other => ("lead_selection", other.to_string(), 8),
    }
}

fn render_direct(manager: &str, leads: &[DirectLead]) -> String {
    let mut lines = vec![format!("{manager}: {} current direct lead(s)", leads.len())];
    lines.extend(leads.iter().map(|lead| {
        format!(
            "  - #{} {} {} (appointment: {})",
            lead.id,
            lead.customer_mobile,
            lead.city.as_deref().unwrap_or("-"),
            lead.appointment_date.map(|date| date.to_string()).unwrap_or_else(|| "unset".into())
        )
    }));
    lines.join("\n")
}

fn render_follow_up(manager: &str, leads: &[FollowUpLead]) -> String {
    let mut lines = vec![format!("{manager}: {} current follow-up lead(s)", leads.len())];
    lines.extend(leads.iter().map(|lead| {
        format!(
            "  - #{} {} {} (remark: {})",
            lead.id,
            lead.customer_mobile,
            lead.city.as_deref().unwrap_or("-"),
            if lead.remark.is_empty() { "-" } else { lead.remark.as_str() }
        )
    }));
    lines.join("\n")
}
