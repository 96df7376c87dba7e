use std::path::Path;

use anyhow::{Context, Result};
use keycycle_core::Settings;

pub fn execute(config: Option<&Path>) -> Result<()> {
    let settings = Settings::load(config).context("invalid settings")?;
    let window = settings.window()?;

    println!("settings ok");
    println!("  rotation_period:            {} days", window.rotation_period());
    println!(
        "  installation_grace_period:  {} days",
        window.installation_grace_period()
    );
    println!(
        "  recovery_grace_period:      {} days",
        window.recovery_grace_period()
    );
    println!(
        "  pending_action_warn_period: {} days",
        window.pending_action_warn_period()
    );
    println!("  dry_run_flag:               {}", settings.dry_run_flag);
    println!("  iam_exemption_group:        {}", settings.iam_exemption_group);
    println!("  email_template_audit:       {}", settings.email_template_audit);
    println!("  email_template_enforce:     {}", settings.email_template_enforce);
    println!(
        "  iam_assumed_role_name:      {}",
        settings.iam_assumed_role_name.as_deref().unwrap_or("(ambient credentials)")
    );
    println!("  role_session_name:          {}", settings.role_session_name);
    println!(
        "  sender_email:               {}",
        settings.sender_email.as_deref().unwrap_or("(unset)")
    );
    println!("  template_dir:               {}", settings.template_dir.display());
    Ok(())
}
