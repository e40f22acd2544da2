//! Configuration inspection commands

use anyhow::Result;
use colored::*;
use std::process::ExitCode;
use sweep_runner::Config;
use sweep_runner::config::JobDefinition;

/// Prints the validated configuration
pub fn validate(config: &Config) -> Result<ExitCode> {
    println!("{}", "Configuration is valid.".green());
    println!();
    println!("{}", "Global settings:".bold());
    let global = &config.global;
    println!("  Inter-poll sleep:   {}s", global.inter_poll_sleep_sec);
    println!("  Max total runtime:  {}s", global.max_total_runtime_sec);
    println!("  Container runtime:  {}", global.container_runtime);
    if let Some(url) = &global.task_api_url {
        println!("  Task API:           {}", url);
    }
    if let Some(path) = &global.report_path {
        println!("  Report path:        {}", path.display());
    }
    println!();

    if config.jobs.is_empty() {
        println!("{}", "No jobs defined.".yellow());
    } else {
        println!("{}", format!("Found {} job(s):", config.jobs.len()).bold());
        println!();
        for job in &config.jobs {
            print_job_definition(job);
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Prints one schedule name per line
pub fn list_schedules(config: &Config) -> Result<ExitCode> {
    for name in config.schedule_names() {
        println!("{}", name);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_job_definition(job: &JobDefinition) {
    println!("  {} {}", "▸".cyan(), job.name.bold());
    println!("    Class:    {}", job.kind.class_name());
    println!("    Schedule: {}", job.schedule);
    if let Some(cron) = &job.cron_expression {
        println!("    Cron:     {}", cron.dimmed());
    }
    if let Some(regex) = &job.summary_regex {
        println!("    Summary:  {}", regex.dimmed());
    }
    println!();
}
