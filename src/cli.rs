use clap::{crate_version, Arg, ArgAction, ArgMatches, Command};
use env_logger::Builder;
use log::LevelFilter;

use crate::engine::extract_engine::{ExtractConfig, ExtractMode, QueryMode};
use crate::utils::errors::ExtractError;

pub fn build_cli() -> Command {
    Command::new("cohort-extract")
        .version(crate_version!())
        .author("Rhys Newell <rhys.newell94@gmail.com>")
        .about("Cohort variant extraction and joint genotyping from exported variant store tables")
        .arg_required_else_help(true)
        .subcommand(extract_subcommand())
        .subcommand(
            Command::new("shell-completion")
                .about("Generate a shell completion script")
                .arg(
                    Arg::new("output-file")
                        .long("output-file")
                        .short('o')
                        .required(true),
                )
                .arg(
                    Arg::new("shell")
                        .long("shell")
                        .required(true)
                        .value_parser(clap::value_parser!(clap_complete::Shell)),
                ),
        )
}

fn extract_subcommand() -> Command {
    Command::new("extract")
        .about("Stream per-sample records into a filtered joint VCF")
        .arg(
            Arg::new("cohort-table")
                .long("cohort-table")
                .required(true)
                .help("TSV export of the cohort record table (file or directory of shards)"),
        )
        .arg(
            Arg::new("sample-table")
                .long("sample-table")
                .required(true)
                .help("Cohort sample names, one per line, in output column order"),
        )
        .arg(
            Arg::new("reference")
                .long("reference")
                .short('r')
                .required(true)
                .help("Indexed reference FASTA (a .fai sidecar must exist)"),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .default_value("-")
                .help("Output VCF path, or '-' for stdout"),
        )
        .arg(Arg::new("project").long("project").help("Backend project label"))
        .arg(
            Arg::new("filter-table")
                .long("filter-table")
                .help("TSV export of the VQSLOD/YNG filter table; omit for no-filter mode"),
        )
        .arg(
            Arg::new("filter-set-name")
                .long("filter-set-name")
                .default_value("")
                .help("Filter set to select from the filter table"),
        )
        .arg(
            Arg::new("min-location")
                .long("min-location")
                .value_parser(clap::value_parser!(u64))
                .help("Inclusive lower LocationKey bound"),
        )
        .arg(
            Arg::new("max-location")
                .long("max-location")
                .value_parser(clap::value_parser!(u64))
                .help("Inclusive upper LocationKey bound"),
        )
        .arg(
            Arg::new("mode")
                .long("mode")
                .default_value("GENOMES")
                .help("EXOMES, GENOMES, or ARRAYS"),
        )
        .arg(
            Arg::new("query-mode")
                .long("query-mode")
                .default_value("LOCAL_SORT")
                .help("LOCAL_SORT to sort records locally, ORDERED_QUERY to trust backend order"),
        )
        .arg(
            Arg::new("local-sort-max-records-in-ram")
                .long("local-sort-max-records-in-ram")
                .value_parser(clap::value_parser!(usize))
                .default_value("1000000"),
        )
        .arg(
            Arg::new("vqslod-snp-threshold")
                .long("vqslod-snp-threshold")
                .value_parser(clap::value_parser!(f64))
                .default_value("0.0"),
        )
        .arg(
            Arg::new("vqslod-indel-threshold")
                .long("vqslod-indel-threshold")
                .value_parser(clap::value_parser!(f64))
                .default_value("0.0"),
        )
        .arg(
            Arg::new("emit-pls")
                .long("emit-pls")
                .action(ArgAction::SetTrue)
                .help("Emit PL arrays in the output FORMAT fields"),
        )
        .arg(
            Arg::new("print-debug")
                .long("print-debug")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .action(ArgAction::SetTrue),
        )
}

pub fn config_from_matches(m: &ArgMatches) -> Result<ExtractConfig, ExtractError> {
    let mode: ExtractMode = m
        .get_one::<String>("mode")
        .unwrap()
        .parse()
        .map_err(ExtractError::Config)?;
    let query_mode: QueryMode = m
        .get_one::<String>("query-mode")
        .unwrap()
        .parse()
        .map_err(ExtractError::Config)?;
    Ok(ExtractConfig {
        project: m.get_one::<String>("project").cloned(),
        cohort_table: m.get_one::<String>("cohort-table").unwrap().clone(),
        sample_table: m.get_one::<String>("sample-table").unwrap().clone(),
        filter_table: m.get_one::<String>("filter-table").cloned(),
        filter_set_name: m.get_one::<String>("filter-set-name").unwrap().clone(),
        min_location: m.get_one::<u64>("min-location").copied(),
        max_location: m.get_one::<u64>("max-location").copied(),
        mode,
        query_mode,
        local_sort_max_records_in_ram: *m
            .get_one::<usize>("local-sort-max-records-in-ram")
            .unwrap(),
        vqslod_snp_threshold: *m.get_one::<f64>("vqslod-snp-threshold").unwrap(),
        vqslod_indel_threshold: *m.get_one::<f64>("vqslod-indel-threshold").unwrap(),
        emit_pls: m.get_flag("emit-pls"),
        print_debug: m.get_flag("print-debug"),
        ref_sequence_path: m.get_one::<String>("reference").unwrap().clone(),
        output_path: m.get_one::<String>("output").unwrap().clone(),
    })
}

pub fn set_log_level(matches: &ArgMatches, is_last: bool) {
    let mut log_level = LevelFilter::Info;
    let mut specified = false;
    if matches.try_get_one::<bool>("verbose").ok().flatten() == Some(&true) {
        specified = true;
        log_level = LevelFilter::Debug;
    }
    if matches.try_get_one::<bool>("quiet").ok().flatten() == Some(&true) {
        specified = true;
        log_level = LevelFilter::Error;
    }
    if specified || is_last {
        let mut builder = Builder::new();
        builder.filter_level(log_level);
        if let Ok(spec) = std::env::var("RUST_LOG") {
            builder.parse_filters(&spec);
        }
        if builder.try_init().is_err() {
            debug!("Logger already initialized");
        }
    }
}
