use clap::Parser;
use clap::builder::Styles;
use clap::builder::styling::AnsiColor;

pub const DEFAULT_PORT: u16 = 9222;
pub const DEFAULT_HOST: &str = "127.0.0.1";

const AFTER_HELP: &str = "\
Levels:
  open      show everything, including request lines and parameters
  normal    drop dev-server and static-asset noise (default)
  strict    show failures only

Commands:
  navigate <url>                    reload
  click-element <selector>          read-text <selector>
  cookie list|get <name>|set <name> <value>|delete <name>
  storage list|get <key>|set <key> <value>
  emulate-mobile                    throttle-network [kbps]
  wait [ms]                         wait-for-element <selector> [timeout-ms]
  scroll-to <selector|x,y>          screenshot [dir] [filename]
  type <selector> <text>            click-at <x> <y>

Run without a target id to list the targets the debug endpoint exposes.";

/// Cargo-style help colors.
fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Green.on_default().bold())
		.usage(AnsiColor::Green.on_default().bold())
		.literal(AnsiColor::Cyan.on_default())
		.placeholder(AnsiColor::Cyan.on_default())
		.valid(AnsiColor::Cyan.on_default())
}

#[derive(Parser, Debug)]
#[command(name = "pagewatch")]
#[command(about = "Watch a browser page's console and network traffic, or run one command against it")]
#[command(version)]
#[command(styles = styles())]
#[command(after_help = AFTER_HELP)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Debug endpoint port
	#[arg(long, env = "PAGEWATCH_PORT", default_value_t = DEFAULT_PORT)]
	pub port: u16,

	/// Debug endpoint host
	#[arg(long, default_value = DEFAULT_HOST)]
	pub host: String,

	/// Scan nearby ports when nothing answers on --port
	#[arg(long)]
	pub probe: bool,

	/// Target id, as listed by the debug endpoint
	#[arg(value_name = "TARGET_ID")]
	pub target_id: Option<String>,

	/// Optional level (open, normal, strict), then an optional command and its arguments
	#[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
	pub rest: Vec<String>,
}
