use std::path::PathBuf;

use clap::Parser;

use dicomfix_core::mutate::{
    parse_count, parse_number, parse_number_list, parse_table_position_cm, RangeShifterChoice,
};
use dicomfix_core::{EditConfig, EditKind, PlanError};

#[derive(Parser, Debug)]
#[command(name = "dicomfix")]
#[command(version, about = "Edit and export proton therapy RT Ion Plans")]
pub struct Cli {
    /// Input RT Ion Plan DICOM file
    #[arg(value_name = "INPUTFILE")]
    pub input: PathBuf,

    /// Output DICOM file
    #[arg(short, long, default_value = "output.dcm")]
    pub output: PathBuf,

    /// CSV file with `field,spot,mu` rows overwriting spot MUs
    #[arg(short, long)]
    pub weights: Option<PathBuf>,

    /// TOML file with edits; command line flags take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Export one RACEHORSE spot list per energy layer using this base name
    #[arg(short = 'e', long)]
    pub export_racehorse: Option<PathBuf>,

    /// Export all spots to `<base>.csv`
    #[arg(long)]
    pub export_spotlist: Option<PathBuf>,

    /// Export a sample of spots to this CSV file
    #[arg(long)]
    pub export_sample: Option<PathBuf>,

    /// Number of spots in the exported sample
    #[arg(long, default_value_t = 10)]
    pub sample_count: usize,

    /// Seed for random spot sampling
    #[arg(long)]
    pub sample_seed: Option<u64>,

    /// Sample spots randomly instead of taking the first ones
    #[arg(long)]
    pub random: bool,

    /// Set the plan to APPROVED
    #[arg(short, long)]
    pub approve: bool,

    /// Set RT plan and review date and time to now
    #[arg(long)]
    pub date: bool,

    /// Set the plan intent to CURATIVE
    #[arg(long)]
    pub intent_curative: bool,

    /// Print a plan summary and exit
    #[arg(short, long)]
    pub inspect: bool,

    /// Print every DICOM attribute and exit
    #[arg(long)]
    pub inspect_all: bool,

    /// Prepare the plan for treatment room 4
    #[arg(long)]
    pub wizard_tr4: bool,

    /// Make RayStation plans acceptable to the delivery system
    #[arg(long)]
    pub fix_raystation: bool,

    /// Print N sampled spots with MU before and after editing
    #[arg(short, long, value_name = "N")]
    pub print_spots: Option<usize>,

    /// Comma separated gantry angles in degrees, one per field
    #[arg(short, long, value_name = "ANGLES")]
    pub gantry_angles: Option<String>,

    /// Append N copies of all fields
    #[arg(short, long, value_name = "N")]
    pub duplicate_fields: Option<String>,

    /// Rescale the plan to this total dose in Gy(RBE)
    #[arg(long, value_name = "DOSE")]
    pub rescale_dose: Option<String>,

    /// Multiply all MUs by this factor
    #[arg(long, value_name = "FACTOR")]
    pub rescale_factor: Option<String>,

    /// Rescale so that the smallest spot gets 1 MU
    #[arg(long)]
    pub rescale_minimize: bool,

    /// Table position as `vertical,longitudinal,lateral` in cm
    #[arg(long, value_name = "V,L,LAT", allow_hyphen_values = true)]
    pub table_position: Option<String>,

    /// Snout position in cm
    #[arg(long, value_name = "CM")]
    pub snout_position: Option<String>,

    #[arg(long)]
    pub treatment_machine: Option<String>,

    #[arg(long)]
    pub plan_label: Option<String>,

    #[arg(long)]
    pub patient_name: Option<String>,

    #[arg(long)]
    pub reviewer_name: Option<String>,

    /// Range shifter to install: RS_2CM, RS_5CM or NONE
    #[arg(long)]
    pub range_shifter: Option<RangeShifterChoice>,

    /// Repaint every spot N times
    #[arg(long, value_name = "N")]
    pub repaint: Option<String>,

    /// Refuse to write the output when any edit fails
    #[arg(long)]
    pub strict: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Overlay the command line edits on `base`.
    ///
    /// A numeric flag that does not parse replaces the file value with a
    /// rejected edit, so only that edit fails when the batch runs.
    pub fn edit_config(&self, base: EditConfig) -> EditConfig {
        let mut config = base;
        config.approve |= self.approve;
        config.date |= self.date;
        config.intent_curative |= self.intent_curative;
        config.fix_raystation |= self.fix_raystation;
        config.wizard_tr4 |= self.wizard_tr4;
        config.rescale_minimize |= self.rescale_minimize;

        let mut rejected = Vec::new();
        overlay_parsed(
            &mut config.gantry_angles,
            self.gantry_angles.as_deref(),
            EditKind::GantryAngles,
            &mut rejected,
            |s| parse_number_list("gantry angles", s),
        );
        overlay_parsed(
            &mut config.table_position_mm,
            self.table_position.as_deref(),
            EditKind::TablePosition,
            &mut rejected,
            parse_table_position_cm,
        );
        overlay_parsed(
            &mut config.snout_position_mm,
            self.snout_position.as_deref(),
            EditKind::SnoutPosition,
            &mut rejected,
            |s| parse_number("snout position", s).map(|cm| cm * 10.0),
        );
        overlay_parsed(
            &mut config.duplicate_fields,
            self.duplicate_fields.as_deref(),
            EditKind::DuplicateFields,
            &mut rejected,
            |s| parse_count("duplicate fields", s),
        );
        overlay_parsed(
            &mut config.rescale_dose,
            self.rescale_dose.as_deref(),
            EditKind::RescaleDose,
            &mut rejected,
            |s| parse_number("rescale dose", s),
        );
        overlay_parsed(
            &mut config.rescale_factor,
            self.rescale_factor.as_deref(),
            EditKind::RescaleFactor,
            &mut rejected,
            |s| parse_number("rescale factor", s),
        );
        overlay_parsed(
            &mut config.repaint,
            self.repaint.as_deref(),
            EditKind::Repaint,
            &mut rejected,
            |s| parse_count("repaint", s),
        );
        config.rejected.extend(rejected);

        override_with(&mut config.treatment_machine, self.treatment_machine.clone());
        override_with(&mut config.plan_label, self.plan_label.clone());
        override_with(&mut config.patient_name, self.patient_name.clone());
        override_with(&mut config.reviewer_name, self.reviewer_name.clone());
        override_with(&mut config.range_shifter, self.range_shifter);
        config
    }
}

fn overlay_parsed<T>(
    target: &mut Option<T>,
    input: Option<&str>,
    kind: EditKind,
    rejected: &mut Vec<(EditKind, PlanError)>,
    parse: impl FnOnce(&str) -> dicomfix_core::Result<T>,
) {
    let Some(input) = input else {
        return;
    };
    match parse(input) {
        Ok(value) => *target = Some(value),
        Err(e) => {
            *target = None;
            rejected.push((kind, e));
        }
    }
}

fn override_with<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}
