use std::io::Write as _;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use sdk_onboarding::flow::{FlowController, FlowOutcome, UserAction};
use sdk_onboarding::protocol::{Payload, StoreSearchResult};
use sdk_onboarding::providers::SimulatedProvider;
use sdk_onboarding::seed::{keys, SeedStore};
use sdk_onboarding::steps::{AdChannel, Environment, Framework, Platform, StepStatus};
use sdk_onboarding::WizardConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = WizardConfig::default();
    let provider = Arc::new(SimulatedProvider::new(config.clone()));

    // Survey answers from the hosting shell, if any.
    let mut seed = SeedStore::new();
    if let Ok(raw) = std::env::var("ONBOARDING_SURVEY") {
        seed.insert(keys::SURVEY_ANSWERS, raw);
    }
    if let Ok(raw) = std::env::var("ONBOARDING_TERMS") {
        seed.insert(keys::TERMS_AGREEMENT, raw);
    }

    let mut controller = FlowController::with_seed(config, provider, &mut seed);

    eprintln!("📲 SDK Onboarding v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Commands: env / platforms / name / search / pick / manual /");
    eprintln!("   framework / channels / yes / no / ok / another / skip /");
    eprintln!("   steps / apps / step <id> / quit. Anything else is chat.\n");

    let mut last_results: Vec<StoreSearchResult> = Vec::new();
    render(&controller.start().await, &mut last_results);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" || line == "quit" {
            break;
        }
        if line == "steps" {
            print_steps(&controller);
            continue;
        }
        if line == "apps" {
            print_apps(&controller);
            continue;
        }

        let Some(action) = parse_action(line, &controller, &last_results) else {
            eprintln!("   (could not parse that; try `steps` or plain text)");
            continue;
        };
        match controller.handle(action).await {
            Ok(outcome) => render(&outcome, &mut last_results),
            Err(e) => eprintln!("   ✗ {e}"),
        }
    }

    Ok(())
}

fn parse_action(
    line: &str,
    controller: &FlowController,
    last_results: &[StoreSearchResult],
) -> Option<UserAction> {
    let (cmd, rest) = match line.split_once(' ') {
        Some((c, r)) => (c, r.trim()),
        None => (line, ""),
    };

    let action = match cmd {
        "env" => UserAction::SelectEnvironment(parse_environment(rest)?),
        "platforms" => UserAction::SelectPlatforms(
            rest.split(',')
                .map(|p| parse_platform(p.trim()))
                .collect::<Option<Vec<_>>>()?,
        ),
        "name" => UserAction::EnterAppName(rest.to_string()),
        "search" => UserAction::SubmitSearch {
            query: rest.to_string(),
        },
        "pick" => {
            let index: usize = rest.parse().ok()?;
            let result = last_results.get(index.checked_sub(1)?)?.clone();
            UserAction::SelectSearchResult(result)
        }
        "manual" => {
            let mut parts = rest.splitn(2, ',');
            let name = parts.next()?.trim().to_string();
            let store_id = parts.next().map(|s| s.trim().to_string());
            UserAction::EnterManualApp { name, store_id }
        }
        "framework" => UserAction::SelectFramework(parse_framework(rest)?),
        "channels" => UserAction::SelectChannels(
            rest.split(',')
                .map(|c| parse_channel(c.trim()))
                .collect::<Option<Vec<_>>>()?,
        ),
        "yes" => UserAction::VerifySdk { installed: true },
        "no" => UserAction::VerifySdk { installed: false },
        "ok" | "continue" | "next" => UserAction::Continue,
        "another" => UserAction::AddAnotherApp,
        "skip" => UserAction::Skip,
        "copy" => UserAction::CopyToken(rest.to_string()),
        "step" => {
            let app_id = controller.active_app()?;
            let step = serde_json::from_value(serde_json::Value::String(rest.to_string())).ok()?;
            UserAction::StepClicked { app_id, step }
        }
        _ => UserAction::FreeText(line.to_string()),
    };
    Some(action)
}

fn parse_environment(s: &str) -> Option<Environment> {
    match s {
        "dev" => Some(Environment::Dev),
        "production" | "prod" => Some(Environment::Production),
        _ => None,
    }
}

fn parse_platform(s: &str) -> Option<Platform> {
    match s {
        "ios" => Some(Platform::Ios),
        "android" => Some(Platform::Android),
        "web" => Some(Platform::Web),
        _ => None,
    }
}

fn parse_framework(s: &str) -> Option<Framework> {
    match s {
        "native" => Some(Framework::Native),
        "react-native" | "rn" => Some(Framework::ReactNative),
        "flutter" => Some(Framework::Flutter),
        "expo" => Some(Framework::Expo),
        "unity" => Some(Framework::Unity),
        _ => None,
    }
}

fn parse_channel(s: &str) -> Option<AdChannel> {
    match s {
        "meta" => Some(AdChannel::Meta),
        "google-ads" | "google" => Some(AdChannel::GoogleAds),
        "tiktok" => Some(AdChannel::TikTok),
        "apple-search-ads" | "asa" => Some(AdChannel::AppleSearchAds),
        "snapchat" => Some(AdChannel::Snapchat),
        _ => None,
    }
}

fn print_steps(controller: &FlowController) {
    let Some(app) = controller
        .active_app()
        .and_then(|id| controller.registry().get(id))
    else {
        eprintln!("   (no active app yet)");
        return;
    };
    let progress = controller.registry().progress(app.id);
    eprintln!("   {} {}/{}", app.info.name, progress.completed, progress.total);
    for step in &app.steps {
        let marker = match step.status {
            StepStatus::Completed => "✓",
            StepStatus::InProgress => "▶",
            StepStatus::Pending => "·",
        };
        eprintln!("   {marker} [{}] {}: {}", step.id, step.title, step.description);
    }
}

fn print_apps(controller: &FlowController) {
    if controller.registry().is_empty() {
        eprintln!("   (no apps registered yet)");
        return;
    }
    for app in controller.registry().iter() {
        let progress = controller.registry().progress(app.id);
        let marker = if app.expanded { "▶" } else { " " };
        eprintln!(
            "   {marker} {} [{}] {}/{} steps",
            app.info.name, app.environment, progress.completed, progress.total
        );
    }
}

fn render(outcome: &FlowOutcome, last_results: &mut Vec<StoreSearchResult>) {
    if outcome.ignored {
        eprintln!("   (that doesn't apply right now)");
        return;
    }
    for payload in &outcome.payloads {
        render_payload(payload, last_results);
    }
}

fn render_payload(payload: &Payload, last_results: &mut Vec<StoreSearchResult>) {
    match payload {
        Payload::Welcome => {
            println!("🧭 Welcome! Let's get your app measuring. I'll walk you through setup.");
        }
        Payload::EnvironmentSelect => {
            println!("Is this a development sandbox or a production app? (`env dev` / `env prod`)");
        }
        Payload::AppNameInput { .. } => {
            println!("What should we call your app? (`name My App`)");
        }
        Payload::PlatformMultiSelect { options } => {
            let opts: Vec<String> = options.iter().map(|p| p.to_string()).collect();
            println!(
                "Which platforms does it run on? (`platforms {}`, comma-separate several)",
                opts.join("|")
            );
        }
        Payload::PlatformRegistration {
            platform,
            index,
            total,
        } => {
            println!(
                "Let's find your {} listing ({}/{}). `search <store query>` or `manual <name>[, store id]`.",
                platform,
                index + 1,
                total
            );
        }
        Payload::AppSearchLoading { query, platform } => {
            println!("🔎 Searching the {platform} store for \"{query}\"…");
        }
        Payload::AppSearchResults { results, .. } => {
            println!("Found these. `pick <n>` or search again:");
            for (i, r) in results.iter().enumerate() {
                println!("  {}. {} ({})", i + 1, r.name, r.store_id);
            }
            *last_results = results.clone();
        }
        Payload::TimezoneCurrencyConfirm {
            timezone,
            currency,
            app_name,
        } => {
            println!(
                "Registering \"{app_name}\" with timezone {timezone} and currency {currency}. `ok` to confirm."
            );
        }
        Payload::TokenDisplay {
            app_name,
            app_token,
            sdk_key,
            signature_secret,
        } => {
            println!("🎉 {app_name} is registered. Your credentials:");
            println!("   app token         {app_token}");
            println!("   SDK key           {sdk_key}");
            println!("   signature secret  {signature_secret}");
            println!("(`copy <value>` to copy one, `ok` to continue)");
        }
        Payload::SdkInstallChoice { platforms } => {
            let names: Vec<String> = platforms.iter().map(|p| p.to_string()).collect();
            println!(
                "Time to add the SDK for {}. `ok` to choose your framework.",
                names.join(" + ")
            );
        }
        Payload::FrameworkSelect { options } => {
            let names: Vec<String> = options.iter().map(|f| f.to_string()).collect();
            println!("Which framework is the app built with? (`framework {}`)", names.join("|"));
        }
        Payload::SdkInstallGuide {
            framework,
            platform,
        } => match platform {
            Some(p) => println!("📦 Install the {p} SDK ({framework}). `ok` when it builds."),
            None => println!("📦 Install the {framework} SDK package. `ok` when it builds."),
        },
        Payload::SdkInitCode {
            platform, snippet, ..
        } => {
            match platform {
                Some(p) => println!("Initialize on {p}:"),
                None => println!("Initialize the SDK at startup:"),
            }
            println!("    {snippet}");
            println!("(`ok` once it's in)");
        }
        Payload::WebSdkInstallGuide { snippet } => {
            println!("🌐 Add the web SDK to your page:");
            println!("    {snippet}");
            println!("(`ok` when deployed)");
        }
        Payload::WebSdkInitCode { snippet, .. } => {
            println!("Initialize it with your token:");
            println!("    {snippet}");
            println!("(`ok` once it's in)");
        }
        Payload::DeeplinkSetupGuide { platform, scheme } => match platform {
            Some(p) => println!("🔗 Register the {scheme} scheme in your {p} project. `ok` when done."),
            None => println!("🔗 Register the {scheme} deep-link scheme. `ok` when done."),
        },
        Payload::SdkTestPrompt { app_name } => {
            println!("Run {app_name} on a device. Is the SDK installed and sending? (`yes`/`no`)");
        }
        Payload::DetectionLoading { .. } => {
            println!("📡 Watching for your first SDK session…");
        }
        Payload::DetectionResult { detected } => {
            if *detected {
                println!("✅ SDK traffic detected. You're live!");
            } else {
                println!("No traffic seen yet.");
            }
        }
        Payload::TrackingLinkGuide => {
            println!("Next: a tracking link attributes installs to your campaigns.");
        }
        Payload::TrackingLinkDisplay { url } => {
            println!("Your first tracking link: {url} (`ok` to continue)");
        }
        Payload::DeeplinkTestPrompt { scheme } => {
            println!("Open {scheme} on a device to test deep links. `ok` once it routes.");
        }
        Payload::EventTaxonomyIntro => {
            println!("Let's sketch the in-app events worth measuring:");
        }
        Payload::EventTaxonomyTable { events } => {
            for event in events {
                println!("   • {event}");
            }
            println!("(`ok` to accept this starting set)");
        }
        Payload::ChannelSelect { options } => {
            let names: Vec<String> = options.iter().map(|c| c.to_string()).collect();
            println!("Which ad channels do you run? (`channels {}`)", names.join("|"));
        }
        Payload::ChannelIntegrationGuide { channel } => {
            println!("🔌 Connect {channel} in the partner dashboard. `ok` when linked.");
        }
        Payload::CostIntegrationGuide => {
            println!("💰 Enable cost ingestion so spend lands next to installs. `ok` when on.");
        }
        Payload::SkanIntegrationGuide => {
            println!("🍎 Enable SKAdNetwork and pick a conversion schema. `ok` when set.");
        }
        Payload::AttributionTestPrompt => {
            println!("Run one test install through a tracking link. `ok` once it attributes.");
        }
        Payload::DataVerifyGuide => {
            println!("📊 Check the dashboard: installs, sessions, and events flowing? `ok` to finish.");
        }
        Payload::DevCompletionSummary {
            app_name,
            completed_steps,
            total_steps,
        } => {
            println!("🏁 {app_name} sandbox setup done ({completed_steps}/{total_steps} steps).");
        }
        Payload::CompletionSummary { data } => {
            println!(
                "🏁 {} fully onboarded: {}/{} steps, {} channel(s), {:.0}% overall.",
                data.app_name,
                data.completed_steps,
                data.total_steps,
                data.channels.len(),
                data.overall_progress * 100.0
            );
        }
        Payload::AddAnotherApp => {
            println!("Want to onboard another app? (`another` / `skip`)");
        }
        Payload::PhaseHeader { phase, title } => {
            println!("\n━━ Phase {phase}: {title} ━━");
        }
        Payload::Acknowledgement { text } => println!("{text}"),
        Payload::RetryPrompt { operation, reason } => {
            println!("⚠️ {operation} didn't go through ({reason}). Try again when ready.");
        }
        Payload::Text { body } => println!("{body}"),
        // User-authored payloads are echoed by the terminal itself.
        _ => {}
    }
}
