use crate::common::SegConfig;

const CHECKPOINT_PREFIX: &str = "https://dl.fbaipublicfiles.com/detectron2/";

/// Pretrained COCO instance-segmentation baselines the config builder can start from.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum ZooModel {
    MaskRcnnR50Fpn1x,
    #[default] MaskRcnnR50Fpn3x,
    MaskRcnnR101Fpn3x,
    MaskRcnnX101Fpn3x,
}

impl ZooModel {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MaskRcnnR50Fpn1x => "COCO-InstanceSegmentation/mask_rcnn_R_50_FPN_1x",
            Self::MaskRcnnR50Fpn3x => "COCO-InstanceSegmentation/mask_rcnn_R_50_FPN_3x",
            Self::MaskRcnnR101Fpn3x => "COCO-InstanceSegmentation/mask_rcnn_R_101_FPN_3x",
            Self::MaskRcnnX101Fpn3x => "COCO-InstanceSegmentation/mask_rcnn_X_101_32x8d_FPN_3x",
        }
    }

    /// Accepts the zoo name with or without the `COCO-InstanceSegmentation/` prefix and `.yaml` suffix.
    pub fn from(name: &str) -> Option<ZooModel> {
        let name = name.trim_end_matches(".yaml");
        let name = name.rsplit('/').next().unwrap_or(name);
        match name.to_lowercase().as_str() {
            "mask_rcnn_r_50_fpn_1x" => Some(ZooModel::MaskRcnnR50Fpn1x),
            "mask_rcnn_r_50_fpn_3x" => Some(ZooModel::MaskRcnnR50Fpn3x),
            "mask_rcnn_r_101_fpn_3x" => Some(ZooModel::MaskRcnnR101Fpn3x),
            "mask_rcnn_x_101_32x8d_fpn_3x" => Some(ZooModel::MaskRcnnX101Fpn3x),
            _ => None,
        }
    }

    pub fn config_file(&self) -> String {
        format!("{}.yaml", self.name())
    }

    /// URL of the COCO-trained weights for this baseline.
    pub fn checkpoint_url(&self) -> String {
        let suffix = match self {
            Self::MaskRcnnR50Fpn1x => "137260431/model_final_a54504.pkl",
            Self::MaskRcnnR50Fpn3x => "137849600/model_final_f10217.pkl",
            Self::MaskRcnnR101Fpn3x => "138205316/model_final_a3ec72.pkl",
            Self::MaskRcnnX101Fpn3x => "139653917/model_final_2d9806.pkl",
        };
        format!("{}{}/{}", CHECKPOINT_PREFIX, self.name(), suffix)
    }

    /// Baseline config: framework defaults with the FPN Mask R-CNN base settings and the
    /// schedule/backbone of this model applied.
    pub fn get_config(&self) -> SegConfig {
        let mut cfg = SegConfig::default();

        cfg.model.mask_on = true;
        cfg.input.min_size_train = vec![640, 672, 704, 736, 768, 800];
        cfg.solver.ims_per_batch = 16;
        cfg.solver.base_lr = 0.02;

        match self {
            Self::MaskRcnnR50Fpn1x => {
                cfg.model.weights = "detectron2://ImageNetPretrained/MSRA/R-50.pkl".to_string();
                cfg.solver.steps = vec![60000, 80000];
                cfg.solver.max_iter = 90000;
            }
            Self::MaskRcnnR50Fpn3x => {
                cfg.model.weights = "detectron2://ImageNetPretrained/MSRA/R-50.pkl".to_string();
                cfg.solver.steps = vec![210000, 250000];
                cfg.solver.max_iter = 270000;
            }
            Self::MaskRcnnR101Fpn3x => {
                cfg.model.weights = "detectron2://ImageNetPretrained/MSRA/R-101.pkl".to_string();
                cfg.model.resnets.depth = 101;
                cfg.solver.steps = vec![210000, 250000];
                cfg.solver.max_iter = 270000;
            }
            Self::MaskRcnnX101Fpn3x => {
                cfg.model.weights = "detectron2://ImageNetPretrained/FAIR/X-101-32x8d.pkl".to_string();
                cfg.model.pixel_std = vec![57.375, 57.120, 58.395];
                cfg.model.resnets.depth = 101;
                cfg.model.resnets.num_groups = 32;
                cfg.model.resnets.width_per_group = 8;
                cfg.model.resnets.stride_in_1x1 = false;
                cfg.solver.steps = vec![210000, 250000];
                cfg.solver.max_iter = 270000;
            }
        }
        cfg
    }
}
