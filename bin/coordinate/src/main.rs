use std::thread;

use anyhow::{ensure, Context};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use ewe_coordination::relay::{relay, relay_async};
use ewe_coordination::{mailbox, BoundedQueue, CoordinationConfig, OrderedBarrier};

#[derive(Parser, Debug)]
#[command(version, about, long_about=None)]
struct Args {
    /// Path to a TOML config file, defaults are used when absent
    #[arg(short, long)]
    config_file: Option<String>,

    /// Log at debug level instead of info
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Push `capacity * 3` items through the bounded queue
    Queue,
    /// Stream `total_items` values from a producer to a consumer
    Transfer {
        /// Push one value at a time instead of batches
        #[arg(long)]
        plain: bool,
    },
    /// Pass a token down a chain of `chain_length` stages
    Relay {
        /// Run the stages as tasks on a single-threaded tokio runtime
        #[arg(long = "async")]
        run_async: bool,
    },
    /// Exchange `exchanges` values through the single-slot mailbox
    Mailbox,
    /// Launch `task_count` tasks in reverse and run them in index order
    Barrier,
    /// Run every scenario once
    All,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let config = match &args.config_file {
        Some(path) => CoordinationConfig::from_path(path)
            .with_context(|| format!("loading config from {path}"))?,
        None => CoordinationConfig::default(),
    };
    tracing::debug!("Using config: {:?}", config);

    match args.command {
        Command::Queue => run_queue(&config),
        Command::Transfer { plain } => run_transfer(&config, plain),
        Command::Relay { run_async } => run_relay(&config, run_async),
        Command::Mailbox => run_mailbox(&config),
        Command::Barrier => run_barrier(&config),
        Command::All => {
            run_queue(&config)?;
            run_transfer(&config, true)?;
            run_transfer(&config, false)?;
            run_relay(&config, false)?;
            run_relay(&config, true)?;
            run_mailbox(&config)?;
            run_barrier(&config)
        }
    }
}

fn run_queue(config: &CoordinationConfig) -> anyhow::Result<()> {
    let capacity = config.queue.capacity;
    let count = capacity * 3;
    let queue = BoundedQueue::try_new(capacity)?;

    let producer_queue = queue.clone();
    let producer = thread::Builder::new()
        .name("queue-producer".into())
        .spawn(move || {
            let _close = producer_queue.close_on_drop();
            for value in 0..count {
                if producer_queue.push(value).is_err() {
                    break;
                }
            }
        })?;

    let received: Vec<usize> = queue.drain().collect();
    producer
        .join()
        .map_err(|_| anyhow::anyhow!("queue producer panicked"))?;

    ensure!(
        received.iter().copied().eq(0..count),
        "queue reordered or lost items"
    );
    tracing::info!(
        "queue: {} items through capacity {} in order",
        received.len(),
        capacity
    );
    Ok(())
}

fn run_transfer(config: &CoordinationConfig, plain: bool) -> anyhow::Result<()> {
    let transfer = if plain {
        config.plain_transfer()
    } else {
        config.batched_transfer()
    };
    let summary = transfer.run()?;

    tracing::info!(
        "transfer ({:?}): {} items in {} deliveries, sum {}",
        transfer.mode(),
        summary.items,
        summary.deliveries,
        summary.sum
    );
    if let Some(last) = summary.batch_sizes.last() {
        tracing::info!("transfer: last batch held {} items", last);
    }
    Ok(())
}

fn run_relay(config: &CoordinationConfig, run_async: bool) -> anyhow::Result<()> {
    let length = config.relay.chain_length;
    let value = if run_async {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?
            .block_on(relay_async(length, 0))?
    } else {
        relay(length, 0)?
    };

    tracing::info!("relay (async: {}): {} stages -> {}", run_async, length, value);
    Ok(())
}

fn run_mailbox(config: &CoordinationConfig) -> anyhow::Result<()> {
    let exchanges = config.mailbox.exchanges;
    let (sender, receiver) = mailbox::create::<usize>();

    let consumer = thread::Builder::new()
        .name("mailbox-receiver".into())
        .spawn(move || (0..exchanges).map(|_| receiver.receive()).collect::<Vec<_>>())?;

    for value in 0..exchanges {
        sender.send(value);
    }
    let received = consumer
        .join()
        .map_err(|_| anyhow::anyhow!("mailbox receiver panicked"))?;

    ensure!(
        received.iter().copied().eq(0..exchanges),
        "mailbox reordered or lost values"
    );
    tracing::info!("mailbox: {} exchanges in order", received.len());
    Ok(())
}

fn run_barrier(config: &CoordinationConfig) -> anyhow::Result<()> {
    let task_count = config.barrier.task_count;
    let barrier = OrderedBarrier::new(task_count, config.barrier.wait_strategy())?;

    let handles = (0..task_count)
        .rev()
        .map(|index| {
            let barrier = barrier.clone();
            thread::Builder::new()
                .name(format!("barrier-task-{index}"))
                .spawn(move || barrier.trigger(index, || index))
        })
        .collect::<Result<Vec<_>, _>>()?;

    barrier.wait_complete();
    for handle in handles {
        handle
            .join()
            .map_err(|_| anyhow::anyhow!("barrier task panicked"))??;
    }

    tracing::info!(
        "barrier ({:?}): {} tasks ran in index order",
        barrier.strategy(),
        barrier.position()
    );
    Ok(())
}
