// Copyright (c) 2021 10x Genomics, Inc. All rights reserved.

// One simulation run, end to end: catalog, repertoire (fresh or thawed),
// population, reads, degradation, outputs, snapshot.  Phases complete
// strictly in that order and all randomness flows through one stream.

use crate::degrade::{logistic_profile, Degrader};
use crate::errors::SimError;
use crate::fastq::{fastq_path, FastqWriter, PERFECT_QUALITY};
use crate::params::{DegradeMethod, ReadType, SimParams};
use crate::population::distribute;
use crate::reads::{simulate_reads, ReadPair};
use crate::snapshot::Snapshot;
use crate::stats::write_statistics;
use log::info;
use tcr_catalog::{SegmentCatalog, SEGMENT_TABLE};
use tcr_recomb::chain::ChainBuilder;
use tcr_recomb::model::{RecombinationModel, RECOMBINATION_TABLE};
use tcr_recomb::repertoire::build_repertoire;
use tcr_recomb::{seeded_rng, SimRng};

pub fn run(params: &SimParams) -> Result<(), SimError> {
    params.validate()?;

    if params.display_degradation {
        display_degradation(params);
        return Ok(());
    }

    let (mut rng, seed) = seeded_rng(params.seed);
    info!("run seed {}", seed);

    let catalog = SegmentCatalog::load(&params.working_dir)?;
    info!("catalog holds {} segments", catalog.len());

    let (repertoire, population) = match &params.load_population {
        Some(path) => {
            let snap = Snapshot::load(path)?;
            snap.verify_against(&catalog)?;
            info!(
                "thawed {} clonotypes carrying {} cells",
                snap.repertoire.len(),
                snap.population.total()
            );
            let Snapshot {
                repertoire,
                population,
                rng: frozen,
                ..
            } = snap;
            rng = frozen;
            (repertoire, population)
        }
        None => {
            let model = RecombinationModel::load(
                &params.working_dir.join(RECOMBINATION_TABLE),
                &catalog,
            )?;
            let builder = ChainBuilder::new(&catalog, &model);
            let repertoire = build_repertoire(
                &mut rng,
                &builder,
                params.repertoire_size,
                params.alpha_beta_ratio,
                params.uniqueness,
            )?;
            let population = distribute(
                &mut rng,
                &params.population,
                repertoire.len(),
                params.population_size,
            )?;
            info!("distributed {} cells", population.total());
            (repertoire, population)
        }
    };

    let reads = simulate_reads(&mut rng, &repertoire, &population, params)?;
    if !reads.is_empty() {
        info!("simulated {} {:?} reads", reads.len(), params.read_type);
        write_reads(params, &reads)?;
        if let Some(spec) = &params.degrade {
            let degrader = Degrader::new(spec, params.read_type)?;
            write_degraded(params, &reads, &degrader, &mut rng)?;
        }
    }

    write_statistics(
        &params
            .working_dir
            .join(format!("{}.statistics.csv", params.output)),
        &repertoire,
        &population,
    )?;

    let snap = Snapshot::new(SEGMENT_TABLE, repertoire, population, rng);
    snap.save(
        &params
            .working_dir
            .join(format!("{}.population.bin", params.output)),
    )?;
    Ok(())
}

// Print the logistic error table for a read of mean length, one line per
// position.

fn display_degradation(params: &SimParams) {
    if let Some(spec) = &params.degrade {
        if let DegradeMethod::Logistic { baseline, limit, k, mid } = &spec.method {
            let len = params.read_len.mean.round().max(1.0) as usize;
            let profile = logistic_profile(*baseline, *limit, *k, *mid, len);
            for (i, e) in profile.iter().enumerate() {
                println!("{}\t{:.6}", i, e);
            }
        }
    }
}

fn write_reads(params: &SimParams, reads: &[ReadPair]) -> Result<(), SimError> {
    let dir = &params.working_dir;
    let base = &params.output;
    match params.read_type {
        ReadType::Single => {
            let mut w = FastqWriter::create(&fastq_path(dir, base, None, false))?;
            for pair in reads {
                let r = &pair.r1;
                let qual = PERFECT_QUALITY.to_string().repeat(r.seq.len());
                w.write_record(&r.id(), &r.comment(), &r.seq, &qual)?;
            }
            w.finish()
        }
        ReadType::Paired | ReadType::Amplicon => {
            let mut w1 = FastqWriter::create(&fastq_path(dir, base, Some(1), false))?;
            let mut w2 = FastqWriter::create(&fastq_path(dir, base, Some(2), false))?;
            for pair in reads {
                let r1 = &pair.r1;
                let qual = PERFECT_QUALITY.to_string().repeat(r1.seq.len());
                w1.write_record(&r1.id(), &r1.comment(), &r1.seq, &qual)?;
                // Paired geometries always carry a mate.
                if let Some(r2) = &pair.r2 {
                    let qual = PERFECT_QUALITY.to_string().repeat(r2.seq.len());
                    w2.write_record(&r2.id(), &r2.comment(), &r2.seq, &qual)?;
                }
            }
            w1.finish()?;
            w2.finish()
        }
    }
}

fn write_degraded(
    params: &SimParams,
    reads: &[ReadPair],
    degrader: &Degrader,
    rng: &mut SimRng,
) -> Result<(), SimError> {
    let dir = &params.working_dir;
    let base = &params.output;
    match params.read_type {
        ReadType::Single => {
            let mut w = FastqWriter::create(&fastq_path(dir, base, None, true))?;
            for pair in reads {
                let r = &pair.r1;
                let (seq, qual) = degrader.degrade(rng, &r.seq, r.index, r.mate);
                let id = format!("{}_DEGRADED", r.id());
                w.write_record(&id, &r.comment(), &seq, &qual)?;
            }
            w.finish()
        }
        ReadType::Paired | ReadType::Amplicon => {
            let mut w1 = FastqWriter::create(&fastq_path(dir, base, Some(1), true))?;
            let mut w2 = FastqWriter::create(&fastq_path(dir, base, Some(2), true))?;
            for pair in reads {
                let r1 = &pair.r1;
                let (seq, qual) = degrader.degrade(rng, &r1.seq, r1.index, r1.mate);
                let id = format!("{}_DEGRADED", r1.id());
                w1.write_record(&id, &r1.comment(), &seq, &qual)?;
                if let Some(r2) = &pair.r2 {
                    let (seq, qual) = degrader.degrade(rng, &r2.seq, r2.index, r2.mate);
                    let id = format!("{}_DEGRADED", r2.id());
                    w2.write_record(&id, &r2.comment(), &seq, &qual)?;
                }
            }
            w1.finish()?;
            w2.finish()
        }
    }
}
