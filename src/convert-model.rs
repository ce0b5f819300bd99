// Copyright 2019-2020 Guillaume Becquin
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use mlm_export::pipelines::conversion::{
    convert_with_fallback, default_output_dir, ConversionConfig, ConversionReport,
};
use std::process::ExitCode;

fn print_summary(report: &ConversionReport) {
    println!();
    println!("Conversion complete");
    println!("  Model:         {} ({})", report.model_name, report.model_type);
    println!("  Vocabulary:    {} tokens", report.vocab_size);
    println!("  Output shape:  {:?}", report.output_shape);
    println!("  Vocabulary:    {}", report.vocab_path.display());
    println!("  Merges:        {}", report.merges_path.display());
    println!("  Model package: {}", report.package_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Add the model package to the WordPredictor project");
    println!("  2. Bundle vocab.json and merges.txt with the application resources");
    println!("  3. Feed int32 input_ids and attention_mask of shape [1, 128] and read `logits`");
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let output_dir = default_output_dir();
    println!("Converting BERT masked language model for WordPredictor");
    println!("Output directory: {}", output_dir.display());

    match convert_with_fallback(
        ConversionConfig::bert_base_uncased().with_output_dir(&output_dir),
        ConversionConfig::distilbert_base_uncased().with_output_dir(&output_dir),
    ) {
        Ok(report) => {
            print_summary(&report);
            ExitCode::SUCCESS
        }
        Err(error) => {
            log::error!("{error}");
            ExitCode::FAILURE
        }
    }
}
